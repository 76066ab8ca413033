use crate::types::{BuildingKind, GenomeId, RejectReason, UpgradeKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What produced an issued command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CommandOrigin {
    /// Index into the active genome
    Directive(usize),
    /// Depot ordered by the supply threshold
    SupplyAutomation,
}

impl fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOrigin::Directive(index) => write!(f, "directive {}", index),
            CommandOrigin::SupplyAutomation => f.write_str("supply automation"),
        }
    }
}

/// Why a directive can never be resolved from here on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unsatisfiable {
    MissingBuilding(BuildingKind),
    NoGasSource,
    AlreadyResearched(UpgradeKind),
    NoWorkers,
    NoArmySource,
}

impl fmt::Display for Unsatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unsatisfiable::MissingBuilding(kind) => {
                write!(f, "{:?} is gone and nothing will replace it", kind)
            }
            Unsatisfiable::NoGasSource => f.write_str("gas is no longer obtainable"),
            Unsatisfiable::AlreadyResearched(upgrade) => {
                write!(f, "{:?} is already researched", upgrade)
            }
            Unsatisfiable::NoWorkers => f.write_str("no workers left to build"),
            Unsatisfiable::NoArmySource => {
                f.write_str("army is below the wave size and cannot grow")
            }
        }
    }
}

/// Observable executor event. Returned with each frame's output and logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
    GenomeActivated {
        genome_id: GenomeId,
        frame: u32,
    },
    DirectiveIssued {
        index: usize,
        frame: u32,
    },
    DirectiveUnsatisfiable {
        genome_id: GenomeId,
        index: usize,
        frame: u32,
        reason: Unsatisfiable,
    },
    CommandRejected {
        genome_id: GenomeId,
        origin: CommandOrigin,
        frame: u32,
        reason: RejectReason,
    },
    BudgetExhausted {
        frame: u32,
        evaluated: usize,
        elapsed_us: u64,
    },
    PlanCompleted {
        genome_id: GenomeId,
        frame: u32,
    },
}
