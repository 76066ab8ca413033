use crate::types::Cost;

/// Tracks what is left to spend while resolving one frame.
///
/// Seeded from the snapshot's available resources. A failed reservation
/// still subtracts, so an earlier directive waiting on money keeps later
/// ones from spending it first.
#[derive(Debug, Clone, Copy)]
pub struct ResourceReservation {
    remaining: Cost,
}

impl ResourceReservation {
    pub fn new(available: Cost) -> Self {
        Self {
            remaining: available,
        }
    }

    pub fn reserve(&mut self, cost: Cost) -> bool {
        let success = self.remaining.can_afford(&cost);
        self.remaining = self.remaining - cost;
        success
    }

    pub fn remaining(&self) -> Cost {
        self.remaining
    }
}
