//! Strategy genome: an ordered list of conditional directives.
//!
//! Directives form a closed set so crossover and mutation can reason about
//! every case. A genome is only valid if each directive depends solely on
//! buildings (and gas) that the starting state or an *earlier* directive
//! provides; see [`TechState`].
//!
//! # Example
//!
//! ```
//! use stratevo::engines::generation::genome::{Directive, Genome, Trigger};
//! use stratevo::types::{GenomeId, UnitKind};
//!
//! let genome = Genome::new(
//!     GenomeId(1),
//!     vec![Directive::ProduceUnit { unit: UnitKind::Worker, trigger: Trigger::Always }],
//! );
//! assert_eq!(genome.len(), 1);
//! ```
use crate::error::{Result, StratError};
use crate::types::{BuildingKind, GenomeId, UnitKind, UpgradeKind};
use crate::world::WorldSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Condition gating a directive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    Always,
    AtFrame(u32),
    MineralsAtLeast(u32),
    GasAtLeast(u32),
    /// supply_used >= supply_cap - n
    SupplyHeadroomAtMost(u32),
    ArmyAtLeast(u32),
    HasBuilding(BuildingKind),
}

impl Trigger {
    pub fn is_met(&self, snapshot: &WorldSnapshot) -> bool {
        let resources = snapshot.resources();
        match *self {
            Trigger::Always => true,
            Trigger::AtFrame(frame) => snapshot.frame() >= frame,
            Trigger::MineralsAtLeast(amount) => i64::from(resources.minerals) >= i64::from(amount),
            Trigger::GasAtLeast(amount) => i64::from(resources.gas) >= i64::from(amount),
            Trigger::SupplyHeadroomAtMost(margin) => {
                i64::from(resources.headroom()) <= i64::from(margin)
            }
            Trigger::ArmyAtLeast(count) => snapshot.army_size() >= count as usize,
            Trigger::HasBuilding(kind) => snapshot.completed_buildings(kind) > 0,
        }
    }

    pub fn required_building(&self) -> Option<BuildingKind> {
        match *self {
            Trigger::HasBuilding(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn needs_gas(&self) -> bool {
        matches!(*self, Trigger::GasAtLeast(amount) if amount > 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    ProduceUnit,
    ConstructBuilding,
    ResearchUpgrade,
    SetSupplyThreshold,
    IssueAttackWave,
    WaitUntil,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 6] = [
        DirectiveKind::ProduceUnit,
        DirectiveKind::ConstructBuilding,
        DirectiveKind::ResearchUpgrade,
        DirectiveKind::SetSupplyThreshold,
        DirectiveKind::IssueAttackWave,
        DirectiveKind::WaitUntil,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    ProduceUnit { unit: UnitKind, trigger: Trigger },
    ConstructBuilding { building: BuildingKind, trigger: Trigger },
    ResearchUpgrade { upgrade: UpgradeKind, trigger: Trigger },
    /// Arms supply automation: a depot is ordered whenever headroom <= margin
    SetSupplyThreshold { margin: u32 },
    IssueAttackWave { min_army: u32, trigger: Trigger },
    WaitUntil { condition: Trigger },
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::ProduceUnit { .. } => DirectiveKind::ProduceUnit,
            Directive::ConstructBuilding { .. } => DirectiveKind::ConstructBuilding,
            Directive::ResearchUpgrade { .. } => DirectiveKind::ResearchUpgrade,
            Directive::SetSupplyThreshold { .. } => DirectiveKind::SetSupplyThreshold,
            Directive::IssueAttackWave { .. } => DirectiveKind::IssueAttackWave,
            Directive::WaitUntil { .. } => DirectiveKind::WaitUntil,
        }
    }

    pub fn trigger(&self) -> Option<&Trigger> {
        match self {
            Directive::ProduceUnit { trigger, .. }
            | Directive::ConstructBuilding { trigger, .. }
            | Directive::ResearchUpgrade { trigger, .. }
            | Directive::IssueAttackWave { trigger, .. } => Some(trigger),
            Directive::WaitUntil { condition } => Some(condition),
            Directive::SetSupplyThreshold { .. } => None,
        }
    }

    /// Buildings this directive depends on, producer first
    pub fn required_buildings(&self) -> Vec<BuildingKind> {
        let mut required = Vec::new();
        match self {
            Directive::ProduceUnit { unit, .. } => {
                required.push(unit.producer());
                required.extend(unit.requires());
            }
            Directive::ConstructBuilding { building, .. } => {
                required.extend(building.requires());
            }
            Directive::ResearchUpgrade { upgrade, .. } => {
                required.push(upgrade.researched_at());
            }
            Directive::SetSupplyThreshold { .. }
            | Directive::IssueAttackWave { .. }
            | Directive::WaitUntil { .. } => {}
        }
        if let Some(building) = self.trigger().and_then(Trigger::required_building) {
            required.push(building);
        }
        required
    }

    pub fn needs_gas(&self) -> bool {
        let price_needs_gas = match self {
            Directive::ProduceUnit { unit, .. } => unit.cost().gas > 0,
            Directive::ConstructBuilding { building, .. } => building.cost().gas > 0,
            Directive::ResearchUpgrade { upgrade, .. } => upgrade.cost().gas > 0,
            _ => false,
        };
        price_needs_gas || self.trigger().map(Trigger::needs_gas).unwrap_or(false)
    }

    pub fn provides(&self) -> Option<BuildingKind> {
        match self {
            Directive::ConstructBuilding { building, .. } => Some(*building),
            _ => None,
        }
    }
}

/// Buildings and research reachable at a point in a directive sequence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TechState {
    buildings: BTreeSet<BuildingKind>,
    upgrades: BTreeSet<UpgradeKind>,
}

impl TechState {
    pub fn new(buildings: impl IntoIterator<Item = BuildingKind>) -> Self {
        Self {
            buildings: buildings.into_iter().collect(),
            upgrades: BTreeSet::new(),
        }
    }

    pub fn has(&self, building: BuildingKind) -> bool {
        self.buildings.contains(&building)
    }

    pub fn gas_available(&self) -> bool {
        self.has(BuildingKind::Refinery)
    }

    pub fn researched(&self, upgrade: UpgradeKind) -> bool {
        self.upgrades.contains(&upgrade)
    }

    /// Why `directive` cannot follow the current state, if it cannot
    pub fn check(&self, directive: &Directive) -> std::result::Result<(), String> {
        for building in directive.required_buildings() {
            if !self.has(building) {
                return Err(format!("requires {:?} which is not declared earlier", building));
            }
        }
        if directive.needs_gas() && !self.gas_available() {
            return Err("requires gas but no Refinery is declared earlier".to_string());
        }
        if let Directive::ResearchUpgrade { upgrade, .. } = directive {
            if self.researched(*upgrade) {
                return Err(format!("{:?} is already researched earlier", upgrade));
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, directive: &Directive) {
        if let Some(building) = directive.provides() {
            self.buildings.insert(building);
        }
        if let Directive::ResearchUpgrade { upgrade, .. } = directive {
            self.upgrades.insert(*upgrade);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genome {
    pub id: GenomeId,
    directives: Vec<Directive>,
}

impl Genome {
    pub fn new(id: GenomeId, directives: Vec<Directive>) -> Self {
        Self { id, directives }
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Same directive sequence, ignoring ids
    pub fn same_plan(&self, other: &Genome) -> bool {
        self.directives == other.directives
    }

    /// Static precondition analysis against a starting building set.
    ///
    /// Rejects forward references: a directive may only rely on what the
    /// start state or an earlier directive provides.
    pub fn validate(&self, start: &TechState) -> Result<()> {
        let mut state = start.clone();
        for (index, directive) in self.directives.iter().enumerate() {
            state
                .check(directive)
                .map_err(|reason| StratError::InvalidGenome {
                    genome_id: self.id,
                    index,
                    reason,
                })?;
            state.apply(directive);
        }
        Ok(())
    }

    /// Tech reachable right before directive `index`
    pub fn state_before(&self, start: &TechState, index: usize) -> TechState {
        let mut state = start.clone();
        for directive in self.directives.iter().take(index) {
            state.apply(directive);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> TechState {
        TechState::new([BuildingKind::CommandCenter])
    }

    #[test]
    fn test_huge_thresholds_do_not_wrap() {
        let snapshot = WorldSnapshot::builder(1, crate::world::Resources::new(50, 0, 9, 10)).build();

        assert!(Trigger::SupplyHeadroomAtMost(u32::MAX).is_met(&snapshot));
        assert!(Trigger::SupplyHeadroomAtMost(1).is_met(&snapshot));
        assert!(!Trigger::SupplyHeadroomAtMost(0).is_met(&snapshot));
        assert!(!Trigger::MineralsAtLeast(u32::MAX).is_met(&snapshot));
        assert!(!Trigger::GasAtLeast(1 << 31).is_met(&snapshot));
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let genome = Genome::new(
            GenomeId(1),
            vec![
                Directive::ProduceUnit {
                    unit: UnitKind::Marine,
                    trigger: Trigger::Always,
                },
                Directive::ConstructBuilding {
                    building: BuildingKind::Barracks,
                    trigger: Trigger::Always,
                },
            ],
        );

        match genome.validate(&start()) {
            Err(StratError::InvalidGenome { index, .. }) => assert_eq!(index, 0),
            other => panic!("expected InvalidGenome, got {:?}", other),
        }
    }

    #[test]
    fn test_declared_prerequisites_validate() {
        let genome = Genome::new(
            GenomeId(2),
            vec![
                Directive::ConstructBuilding {
                    building: BuildingKind::Barracks,
                    trigger: Trigger::MineralsAtLeast(150),
                },
                Directive::ConstructBuilding {
                    building: BuildingKind::Refinery,
                    trigger: Trigger::Always,
                },
                Directive::ConstructBuilding {
                    building: BuildingKind::Academy,
                    trigger: Trigger::HasBuilding(BuildingKind::Barracks),
                },
                Directive::ProduceUnit {
                    unit: UnitKind::Medic,
                    trigger: Trigger::GasAtLeast(25),
                },
            ],
        );

        assert!(genome.validate(&start()).is_ok());
        assert!(genome.state_before(&start(), 2).gas_available());
        assert!(!genome.state_before(&start(), 1).gas_available());
    }

    #[test]
    fn test_gas_without_refinery_is_rejected() {
        let genome = Genome::new(
            GenomeId(3),
            vec![Directive::WaitUntil {
                condition: Trigger::GasAtLeast(50),
            }],
        );
        assert!(genome.validate(&start()).is_err());
    }

    #[test]
    fn test_duplicate_research_is_rejected() {
        let research = Directive::ResearchUpgrade {
            upgrade: UpgradeKind::InfantryWeapons,
            trigger: Trigger::Always,
        };
        let genome = Genome::new(
            GenomeId(4),
            vec![
                Directive::ConstructBuilding {
                    building: BuildingKind::Refinery,
                    trigger: Trigger::Always,
                },
                Directive::ConstructBuilding {
                    building: BuildingKind::EngineeringBay,
                    trigger: Trigger::Always,
                },
                research.clone(),
                research,
            ],
        );

        match genome.validate(&start()) {
            Err(StratError::InvalidGenome { index, .. }) => assert_eq!(index, 3),
            other => panic!("expected InvalidGenome, got {:?}", other),
        }
    }
}
