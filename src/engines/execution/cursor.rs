use super::events::CommandOrigin;
use crate::engines::generation::genome::Genome;
use crate::types::{BuildingKind, Command, EntityKind};
use crate::world::{EntityStatus, WorldSnapshot};
use std::collections::{BTreeMap, BTreeSet};

/// Issued, not yet acknowledged by the engine
#[derive(Debug, Clone)]
pub(crate) struct InFlight {
    pub command: Command,
    pub frame: u32,
    /// Buildings of the ordered kind present when the order went out
    pub baseline: usize,
}

/// Accepted build order whose structure has not shown up yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingStructure {
    kind: BuildingKind,
    since_frame: u32,
    baseline: usize,
}

/// Progress through the active genome.
///
/// Everything here belongs to one activation; a new genome gets a fresh cursor.
#[derive(Debug, Clone, Default)]
pub struct ExecutionCursor {
    position: usize,
    retry: BTreeSet<usize>,
    in_flight: BTreeMap<CommandOrigin, InFlight>,
    pending_structures: Vec<PendingStructure>,
    supply_margin: Option<u32>,
    completed_reported: bool,
}

impl ExecutionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next directive in sequence order
    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn step(&mut self) {
        self.position += 1;
    }

    /// Directives waiting to be re-attempted after a rejection, in sequence order
    pub fn retries(&self) -> Vec<usize> {
        self.retry.iter().copied().collect()
    }

    pub(crate) fn schedule_retry(&mut self, index: usize) {
        self.retry.insert(index);
    }

    pub(crate) fn clear_retry(&mut self, index: usize) {
        self.retry.remove(&index);
    }

    pub(crate) fn mark_in_flight(&mut self, origin: CommandOrigin, entry: InFlight) {
        self.in_flight.insert(origin, entry);
    }

    pub(crate) fn take_in_flight(&mut self, origin: CommandOrigin) -> Option<InFlight> {
        self.in_flight.remove(&origin)
    }

    pub(crate) fn record_structure(&mut self, kind: BuildingKind, since_frame: u32, baseline: usize) {
        self.pending_structures.push(PendingStructure {
            kind,
            since_frame,
            baseline,
        });
    }

    /// Forget accepted orders that either materialized or never did within `grace` frames
    pub(crate) fn prune_structures(&mut self, snapshot: &WorldSnapshot, grace: u32) {
        let frame = snapshot.frame();
        self.pending_structures.retain(|pending| {
            let present = building_count(snapshot, pending.kind);
            present <= pending.baseline && frame.saturating_sub(pending.since_frame) <= grace
        });
    }

    pub fn supply_margin(&self) -> Option<u32> {
        self.supply_margin
    }

    pub(crate) fn set_supply_margin(&mut self, margin: u32) {
        self.supply_margin = Some(margin);
    }

    /// True if `kind` is on its way: ordered, accepted but not yet visible,
    /// or provided by a directive waiting for a retry.
    pub fn expects_building(&self, genome: &Genome, kind: BuildingKind) -> bool {
        let ordered = self.in_flight.values().any(
            |entry| matches!(entry.command, Command::Build { building, .. } if building == kind),
        );
        let accepted = self.pending_structures.iter().any(|p| p.kind == kind);
        let retried = self.retry.iter().any(|index| {
            genome
                .directives()
                .get(*index)
                .and_then(|d| d.provides())
                == Some(kind)
        });
        ordered || accepted || retried
    }

    /// A depot is already coming, so supply automation should hold off
    pub(crate) fn depot_pending(&self, snapshot: &WorldSnapshot) -> bool {
        let under_construction = snapshot.own().iter().any(|e| {
            e.kind == EntityKind::Building(BuildingKind::SupplyDepot)
                && e.status == EntityStatus::UnderConstruction
        });
        let accepted = self
            .pending_structures
            .iter()
            .any(|p| p.kind == BuildingKind::SupplyDepot);
        let ordered = self.in_flight.values().any(|entry| {
            matches!(
                entry.command,
                Command::Build {
                    building: BuildingKind::SupplyDepot,
                    ..
                }
            )
        });
        under_construction || accepted || ordered
    }

    /// Every directive consumed and nothing left to retry or confirm
    pub fn is_finished(&self, genome: &Genome) -> bool {
        self.position >= genome.len() && self.retry.is_empty() && self.in_flight.is_empty()
    }

    pub(crate) fn take_completion(&mut self, genome: &Genome) -> bool {
        if self.completed_reported || !self.is_finished(genome) {
            return false;
        }
        self.completed_reported = true;
        true
    }
}

pub(crate) fn building_count(snapshot: &WorldSnapshot, kind: BuildingKind) -> usize {
    snapshot
        .own()
        .iter()
        .filter(|e| e.building_kind() == Some(kind))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::generation::genome::{Directive, Trigger};
    use crate::types::{EntityId, GenomeId, Position};
    use crate::world::{OwnedEntity, Resources};

    fn depot_plan() -> Genome {
        Genome::new(
            GenomeId(1),
            vec![Directive::ConstructBuilding {
                building: BuildingKind::SupplyDepot,
                trigger: Trigger::Always,
            }],
        )
    }

    #[test]
    fn test_retried_directive_counts_as_expected_building() {
        let genome = depot_plan();
        let mut cursor = ExecutionCursor::new();
        assert!(!cursor.expects_building(&genome, BuildingKind::SupplyDepot));

        cursor.schedule_retry(0);
        assert!(cursor.expects_building(&genome, BuildingKind::SupplyDepot));
        assert!(!cursor.is_finished(&genome));
    }

    #[test]
    fn test_pending_structure_expires() {
        let mut cursor = ExecutionCursor::new();
        cursor.record_structure(BuildingKind::Barracks, 100, 0);

        let early = WorldSnapshot::builder(200, Resources::new(0, 0, 0, 10)).build();
        cursor.prune_structures(&early, 480);
        assert!(cursor.expects_building(&depot_plan(), BuildingKind::Barracks));

        let late = WorldSnapshot::builder(1000, Resources::new(0, 0, 0, 10)).build();
        cursor.prune_structures(&late, 480);
        assert!(!cursor.expects_building(&depot_plan(), BuildingKind::Barracks));
    }

    #[test]
    fn test_pending_structure_cleared_once_visible() {
        let mut cursor = ExecutionCursor::new();
        cursor.record_structure(BuildingKind::SupplyDepot, 10, 0);

        let snapshot = WorldSnapshot::builder(20, Resources::new(0, 0, 0, 10))
            .entity(OwnedEntity {
                id: EntityId(4),
                kind: EntityKind::Building(BuildingKind::SupplyDepot),
                position: Position::new(64, 0),
                health: 10,
                status: EntityStatus::UnderConstruction,
            })
            .build();
        assert!(cursor.depot_pending(&snapshot));

        cursor.prune_structures(&snapshot, 480);
        assert!(cursor.pending_structures.is_empty());
    }
}
