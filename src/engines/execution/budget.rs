use std::time::{Duration, Instant};

/// Wall-clock allowance for one frame's decision work
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    started: Instant,
    limit: Option<Duration>,
}

impl FrameBudget {
    /// `None` means unbounded, used by offline simulation so results do not
    /// depend on machine speed.
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn exhausted(&self) -> bool {
        match self.limit {
            Some(limit) => self.started.elapsed() >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_budget_never_exhausts() {
        let budget = FrameBudget::start(None);
        assert!(!budget.exhausted());
    }

    #[test]
    fn test_zero_budget_is_exhausted() {
        let budget = FrameBudget::start(Some(Duration::ZERO));
        assert!(budget.exhausted());
    }
}
