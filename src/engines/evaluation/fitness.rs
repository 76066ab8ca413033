use super::scenario::MatchOutcome;
use crate::error::StratError;
use crate::types::GenomeId;
use serde::{Deserialize, Serialize};

/// Score given to genomes whose evaluation failed. Real scores are never negative.
pub const MIN_FITNESS: f64 = -1.0;

const WIN_BASE: f64 = 1000.0;
const WIN_SPEED_BONUS: f64 = 500.0;
const LOSS_SURVIVAL_WEIGHT: f64 = 200.0;
const EFFICIENCY_WEIGHT: f64 = 100.0;

/// Result of evaluating one genome. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    pub genome_id: GenomeId,
    pub fitness: f64,
    /// Won at least half of the repetitions
    pub won: bool,
    pub win_rate: f64,
    /// Spent over gathered, in [0, 1]
    pub resource_efficiency: f64,
    /// Earliest frame an attack wave went out
    pub time_to_milestone: Option<u32>,
    pub end_frame: u32,
    pub resource_curve: Vec<u64>,
    pub repetitions: u32,
    /// Set when the evaluation failed and the score is [`MIN_FITNESS`]
    pub failure: Option<String>,
}

impl FitnessRecord {
    pub fn failed(genome_id: GenomeId, error: &StratError) -> Self {
        Self {
            genome_id,
            fitness: MIN_FITNESS,
            won: false,
            win_rate: 0.0,
            resource_efficiency: 0.0,
            time_to_milestone: None,
            end_frame: 0,
            resource_curve: Vec::new(),
            repetitions: 0,
            failure: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    /// Average per-repetition scores into one record. Curve and end frame
    /// come from the first repetition, the milestone is the earliest seen.
    pub fn aggregate(genome_id: GenomeId, outcomes: &[MatchOutcome], max_frames: u32) -> Self {
        let count = outcomes.len().max(1) as f64;
        let fitness = outcomes.iter().map(|o| score(o, max_frames)).sum::<f64>() / count;
        let win_rate = outcomes.iter().filter(|o| o.won).count() as f64 / count;
        let resource_efficiency = outcomes.iter().map(efficiency).sum::<f64>() / count;
        let first = outcomes.first();

        Self {
            genome_id,
            fitness,
            won: win_rate >= 0.5,
            win_rate,
            resource_efficiency,
            time_to_milestone: outcomes.iter().filter_map(|o| o.first_attack_frame).min(),
            end_frame: first.map(|o| o.end_frame).unwrap_or(0),
            resource_curve: first.map(|o| o.resource_curve.clone()).unwrap_or_default(),
            repetitions: outcomes.len() as u32,
            failure: None,
        }
    }
}

pub fn efficiency(outcome: &MatchOutcome) -> f64 {
    if outcome.gathered == 0 {
        return 0.0;
    }
    (outcome.spent as f64 / outcome.gathered as f64).clamp(0.0, 1.0)
}

/// Single-match score. Fast wins beat slow wins, any win beats any loss,
/// and a long survival softens a loss.
pub fn score(outcome: &MatchOutcome, max_frames: u32) -> f64 {
    let elapsed = (outcome.end_frame as f64 / max_frames.max(1) as f64).clamp(0.0, 1.0);
    let result = if outcome.won {
        WIN_BASE + WIN_SPEED_BONUS * (1.0 - elapsed)
    } else {
        LOSS_SURVIVAL_WEIGHT * elapsed
    };
    result + EFFICIENCY_WEIGHT * efficiency(outcome)
}
