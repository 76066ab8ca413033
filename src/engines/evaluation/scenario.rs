use crate::config::EvaluationConfig;
use crate::engines::generation::genome::{Genome, TechState};
use crate::error::Result;
use crate::types::{BuildingKind, Position};
use crate::world::Resources;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartingState {
    pub resources: Resources,
    pub workers: u32,
    /// Finished at frame 0
    pub buildings: Vec<BuildingKind>,
    pub base: Position,
}

/// Scripted opponent. Strength is measured in the same units as
/// [`UnitKind::combat_value`](crate::types::UnitKind).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpponentProfile {
    pub base: Position,
    /// Strength that never leaves the enemy base
    pub base_defense: f64,
    pub army_growth_per_minute: f64,
    pub first_attack_frame: Option<u32>,
    pub attack_interval: u32,
    /// Relative jitter on growth and attack timing; 0 makes the match deterministic
    pub noise: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub seed: u64,
    pub start: StartingState,
    pub opponent: OpponentProfile,
}

impl Scenario {
    pub const PRESETS: [&'static str; 3] = ["passive_opponent", "rush_defense", "macro_game"];

    pub fn by_name(name: &str, seed: u64) -> Option<Scenario> {
        let mut scenario = match name {
            "passive_opponent" => Self::passive_opponent(),
            "rush_defense" => Self::rush_defense(),
            "macro_game" => Self::macro_game(),
            _ => return None,
        };
        scenario.seed = seed;
        Some(scenario)
    }

    fn standard_start() -> StartingState {
        StartingState {
            resources: Resources::new(50, 0, 4, 10),
            workers: 4,
            buildings: vec![BuildingKind::CommandCenter],
            base: Position::new(320, 320),
        }
    }

    /// Opponent that only defends its base
    pub fn passive_opponent() -> Scenario {
        Scenario {
            name: "passive_opponent".to_string(),
            seed: 0,
            start: Self::standard_start(),
            opponent: OpponentProfile {
                base: Position::new(3520, 3520),
                base_defense: 6.0,
                army_growth_per_minute: 0.0,
                first_attack_frame: None,
                attack_interval: 0,
                noise: 0.0,
            },
        }
    }

    /// Early, repeated pressure
    pub fn rush_defense() -> Scenario {
        Scenario {
            name: "rush_defense".to_string(),
            seed: 0,
            start: Self::standard_start(),
            opponent: OpponentProfile {
                base: Position::new(3520, 3520),
                base_defense: 4.0,
                army_growth_per_minute: 6.0,
                first_attack_frame: Some(4320),
                attack_interval: 2880,
                noise: 0.1,
            },
        }
    }

    /// Late first attack, strong growth
    pub fn macro_game() -> Scenario {
        Scenario {
            name: "macro_game".to_string(),
            seed: 0,
            start: Self::standard_start(),
            opponent: OpponentProfile {
                base: Position::new(3520, 3520),
                base_defense: 20.0,
                army_growth_per_minute: 8.0,
                first_attack_frame: Some(12_960),
                attack_interval: 4320,
                noise: 0.05,
            },
        }
    }

    pub fn tech_state(&self) -> TechState {
        TechState::new(self.start.buildings.iter().copied())
    }

    pub fn is_stochastic(&self) -> bool {
        self.opponent.noise > 0.0
    }
}

/// Bounds for one simulated match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchLimits {
    pub max_match_frames: u32,
    pub frames_per_decision: u32,
}

impl From<&EvaluationConfig> for MatchLimits {
    fn from(config: &EvaluationConfig) -> Self {
        Self {
            max_match_frames: config.max_match_frames,
            frames_per_decision: config.frames_per_decision,
        }
    }
}

/// How one match went
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub won: bool,
    pub end_frame: u32,
    /// Minerals plus gas, starting bank included
    pub gathered: u64,
    pub spent: u64,
    /// Cumulative spending sampled at every decision step
    pub resource_curve: Vec<u64>,
    pub first_attack_frame: Option<u32>,
    pub peak_army: f64,
    /// Neither side won before the frame limit
    pub timed_out: bool,
}

/// Plays a genome through one match.
///
/// Implementations must not share mutable state between calls; the
/// evaluator runs them concurrently.
pub trait ScenarioRunner: Send + Sync {
    fn run(
        &self,
        genome: Arc<Genome>,
        scenario: &Scenario,
        seed: u64,
        limits: &MatchLimits,
    ) -> Result<MatchOutcome>;
}
