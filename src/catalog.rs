//! Static game data: prices, producers, tech requirements and timings.
//!
//! Frame counts assume 24 frames per game second.

use crate::types::{BuildingKind, Cost, UnitKind, UpgradeKind};

pub const FRAMES_PER_MINUTE: u32 = 1440;
pub const MAX_SUPPLY: i32 = 200;

impl UnitKind {
    pub fn cost(&self) -> Cost {
        match self {
            UnitKind::Worker => Cost::new(0, 50, 1),
            UnitKind::Marine => Cost::new(0, 50, 1),
            UnitKind::Firebat => Cost::new(25, 50, 1),
            UnitKind::Medic => Cost::new(25, 50, 1),
            UnitKind::SiegeTank => Cost::new(100, 150, 2),
        }
    }

    /// Building that trains this unit
    pub fn producer(&self) -> BuildingKind {
        match self {
            UnitKind::Worker => BuildingKind::CommandCenter,
            UnitKind::Marine | UnitKind::Firebat | UnitKind::Medic => BuildingKind::Barracks,
            UnitKind::SiegeTank => BuildingKind::Factory,
        }
    }

    /// Additional tech building required besides the producer
    pub fn requires(&self) -> Option<BuildingKind> {
        match self {
            UnitKind::Firebat | UnitKind::Medic => Some(BuildingKind::Academy),
            _ => None,
        }
    }

    pub fn build_frames(&self) -> u32 {
        match self {
            UnitKind::Worker => 300,
            UnitKind::Marine => 360,
            UnitKind::Firebat | UnitKind::Medic => 360,
            UnitKind::SiegeTank => 750,
        }
    }

    /// Rough fighting strength, worker = 1.0
    pub fn combat_value(&self) -> f64 {
        match self {
            UnitKind::Worker => 1.0,
            UnitKind::Marine => 4.0,
            UnitKind::Firebat => 5.0,
            UnitKind::Medic => 2.0,
            UnitKind::SiegeTank => 12.0,
        }
    }

    pub fn max_health(&self) -> i32 {
        match self {
            UnitKind::Worker => 60,
            UnitKind::Marine => 40,
            UnitKind::Firebat => 50,
            UnitKind::Medic => 60,
            UnitKind::SiegeTank => 150,
        }
    }

    pub fn is_infantry(&self) -> bool {
        matches!(self, UnitKind::Marine | UnitKind::Firebat | UnitKind::Medic)
    }
}

impl BuildingKind {
    pub fn cost(&self) -> Cost {
        match self {
            BuildingKind::CommandCenter => Cost::new(0, 400, 0),
            BuildingKind::SupplyDepot => Cost::new(0, 100, 0),
            BuildingKind::Barracks => Cost::new(0, 150, 0),
            BuildingKind::Refinery => Cost::new(0, 100, 0),
            BuildingKind::Academy => Cost::new(0, 150, 0),
            BuildingKind::Factory => Cost::new(100, 200, 0),
            BuildingKind::EngineeringBay => Cost::new(0, 125, 0),
        }
    }

    /// Building that must exist before this one can be placed
    pub fn requires(&self) -> Option<BuildingKind> {
        match self {
            BuildingKind::CommandCenter | BuildingKind::SupplyDepot | BuildingKind::Refinery => {
                None
            }
            BuildingKind::Barracks | BuildingKind::EngineeringBay => {
                Some(BuildingKind::CommandCenter)
            }
            BuildingKind::Academy | BuildingKind::Factory => Some(BuildingKind::Barracks),
        }
    }

    pub fn build_frames(&self) -> u32 {
        match self {
            BuildingKind::CommandCenter => 1800,
            BuildingKind::SupplyDepot => 600,
            BuildingKind::Barracks => 1200,
            BuildingKind::Refinery => 600,
            BuildingKind::Academy => 1200,
            BuildingKind::Factory => 1200,
            BuildingKind::EngineeringBay => 900,
        }
    }

    pub fn supply_provided(&self) -> i32 {
        match self {
            BuildingKind::CommandCenter => 10,
            BuildingKind::SupplyDepot => 8,
            _ => 0,
        }
    }

    pub fn max_health(&self) -> i32 {
        match self {
            BuildingKind::CommandCenter => 1500,
            BuildingKind::SupplyDepot => 500,
            BuildingKind::Refinery => 750,
            _ => 1000,
        }
    }

    /// Units or upgrades come out of this building
    pub fn is_producer(&self) -> bool {
        !matches!(self, BuildingKind::SupplyDepot | BuildingKind::Refinery)
    }
}

impl UpgradeKind {
    pub fn cost(&self) -> Cost {
        match self {
            UpgradeKind::InfantryWeapons => Cost::new(100, 100, 0),
            UpgradeKind::InfantryArmor => Cost::new(100, 100, 0),
            UpgradeKind::StimPacks => Cost::new(100, 100, 0),
            UpgradeKind::SiegeMode => Cost::new(150, 150, 0),
        }
    }

    /// Building the research runs in
    pub fn researched_at(&self) -> BuildingKind {
        match self {
            UpgradeKind::InfantryWeapons | UpgradeKind::InfantryArmor => {
                BuildingKind::EngineeringBay
            }
            UpgradeKind::StimPacks => BuildingKind::Academy,
            UpgradeKind::SiegeMode => BuildingKind::Factory,
        }
    }

    pub fn research_frames(&self) -> u32 {
        match self {
            UpgradeKind::InfantryWeapons | UpgradeKind::InfantryArmor => 4000,
            UpgradeKind::StimPacks => 1800,
            UpgradeKind::SiegeMode => 1800,
        }
    }

    /// Multiplier applied to the combat value of `unit` once researched
    pub fn combat_bonus(&self, unit: UnitKind) -> f64 {
        match self {
            UpgradeKind::InfantryWeapons if unit.is_infantry() => 1.15,
            UpgradeKind::InfantryArmor if unit.is_infantry() => 1.10,
            UpgradeKind::StimPacks if matches!(unit, UnitKind::Marine | UnitKind::Firebat) => 1.20,
            UpgradeKind::SiegeMode if unit == UnitKind::SiegeTank => 1.50,
            _ => 1.0,
        }
    }
}
