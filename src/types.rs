use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Map position in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Position) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GenomeId(pub u64);

impl fmt::Display for GenomeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Worker,
    Marine,
    Firebat,
    Medic,
    SiegeTank,
}

impl UnitKind {
    pub const ALL: [UnitKind; 5] = [
        UnitKind::Worker,
        UnitKind::Marine,
        UnitKind::Firebat,
        UnitKind::Medic,
        UnitKind::SiegeTank,
    ];

    pub fn is_worker(&self) -> bool {
        matches!(self, UnitKind::Worker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    CommandCenter,
    SupplyDepot,
    Barracks,
    Refinery,
    Academy,
    Factory,
    EngineeringBay,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 7] = [
        BuildingKind::CommandCenter,
        BuildingKind::SupplyDepot,
        BuildingKind::Barracks,
        BuildingKind::Refinery,
        BuildingKind::Academy,
        BuildingKind::Factory,
        BuildingKind::EngineeringBay,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    InfantryWeapons,
    InfantryArmor,
    StimPacks,
    SiegeMode,
}

impl UpgradeKind {
    pub const ALL: [UpgradeKind; 4] = [
        UpgradeKind::InfantryWeapons,
        UpgradeKind::InfantryArmor,
        UpgradeKind::StimPacks,
        UpgradeKind::SiegeMode,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Unit(UnitKind),
    Building(BuildingKind),
}

/// Gas + minerals + supply.
///
/// Components may go negative while planning ahead; `can_afford` treats a
/// negative balance as zero so zero-priced components still pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cost {
    pub gas: i32,
    pub minerals: i32,
    pub supply: i32,
}

impl Cost {
    pub const ZERO: Cost = Cost::new(0, 0, 0);

    pub const fn new(gas: i32, minerals: i32, supply: i32) -> Self {
        Self { gas, minerals, supply }
    }

    pub fn can_afford(&self, price: &Cost) -> bool {
        self.gas.max(0) >= price.gas
            && self.minerals.max(0) >= price.minerals
            && self.supply.max(0) >= price.supply
    }
}

impl Add for Cost {
    type Output = Cost;

    fn add(self, rhs: Cost) -> Cost {
        Cost::new(
            self.gas + rhs.gas,
            self.minerals + rhs.minerals,
            self.supply + rhs.supply,
        )
    }
}

impl Sub for Cost {
    type Output = Cost;

    fn sub(self, rhs: Cost) -> Cost {
        Cost::new(
            self.gas - rhs.gas,
            self.minerals - rhs.minerals,
            self.supply - rhs.supply,
        )
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gas: {}, minerals: {}, supply: {}",
            self.gas, self.minerals, self.supply
        )
    }
}

/// Order handed to the game engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Train {
        producer: EntityId,
        unit: UnitKind,
    },
    Build {
        worker: EntityId,
        building: BuildingKind,
        at: Position,
    },
    Research {
        facility: EntityId,
        upgrade: UpgradeKind,
    },
    Attack {
        units: Vec<EntityId>,
        target: Position,
    },
}

impl Command {
    pub fn cost(&self) -> Cost {
        match self {
            Command::Train { unit, .. } => unit.cost(),
            Command::Build { building, .. } => building.cost(),
            Command::Research { upgrade, .. } => upgrade.cost(),
            Command::Attack { .. } => Cost::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    InsufficientMinerals,
    InsufficientGas,
    SupplyBlocked,
    ProducerBusy,
    InvalidTarget,
    AlreadyResearched,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::InsufficientMinerals => "insufficient minerals",
            RejectReason::InsufficientGas => "insufficient gas",
            RejectReason::SupplyBlocked => "supply blocked",
            RejectReason::ProducerBusy => "producer busy",
            RejectReason::InvalidTarget => "invalid target",
            RejectReason::AlreadyResearched => "already researched",
        };
        f.write_str(text)
    }
}

/// Engine response to a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAck {
    Accepted,
    Rejected(RejectReason),
}
