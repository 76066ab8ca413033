use super::fitness::FitnessRecord;
use super::scenario::{MatchLimits, MatchOutcome, Scenario, ScenarioRunner};
use super::simulator::SimulationRunner;
use crate::config::{EvaluationConfig, ExecutionConfig};
use crate::engines::generation::genome::Genome;
use crate::error::{Result, StratError};
use std::sync::Arc;

/// Seed for repetition `index` of a scenario (SplitMix64 step)
pub fn repetition_seed(seed: u64, index: u32) -> u64 {
    let mut z = seed.wrapping_add((index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Scores genomes by playing them through a [`ScenarioRunner`].
///
/// Holds no mutable state, so one evaluator can serve many threads.
pub struct FitnessEvaluator<R: ScenarioRunner> {
    runner: R,
    config: EvaluationConfig,
}

impl FitnessEvaluator<SimulationRunner> {
    pub fn simulated(config: EvaluationConfig, execution: ExecutionConfig) -> Self {
        Self::new(SimulationRunner::new(execution), config)
    }
}

impl<R: ScenarioRunner> FitnessEvaluator<R> {
    pub fn new(runner: R, config: EvaluationConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Score `genome` on `scenario`.
    ///
    /// Fails with `InvalidGenome` before any simulation if a directive can
    /// never be satisfied from the scenario's starting state, and with
    /// `EvaluationTimeout` if a match hits the frame limit undecided.
    /// Anything else the runner reports becomes an `EvaluatorFault`.
    pub fn evaluate(&self, genome: &Arc<Genome>, scenario: &Scenario) -> Result<FitnessRecord> {
        genome.validate(&scenario.tech_state())?;

        let limits = MatchLimits::from(&self.config);
        let repetitions = if scenario.is_stochastic() {
            self.config.repetitions.max(1)
        } else {
            1
        };

        let mut outcomes: Vec<MatchOutcome> = Vec::with_capacity(repetitions as usize);
        for index in 0..repetitions {
            let seed = repetition_seed(scenario.seed, index);
            let outcome = self
                .runner
                .run(Arc::clone(genome), scenario, seed, &limits)
                .map_err(|e| match e {
                    e @ (StratError::InvalidGenome { .. }
                    | StratError::EvaluationTimeout { .. }
                    | StratError::EvaluatorFault { .. }) => e,
                    other => StratError::EvaluatorFault {
                        genome_id: genome.id,
                        message: other.to_string(),
                    },
                })?;
            if outcome.timed_out {
                return Err(StratError::EvaluationTimeout {
                    genome_id: genome.id,
                    frames: limits.max_match_frames,
                });
            }
            outcomes.push(outcome);
        }

        Ok(FitnessRecord::aggregate(
            genome.id,
            &outcomes,
            limits.max_match_frames,
        ))
    }
}
