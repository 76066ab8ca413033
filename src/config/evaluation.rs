use super::traits::{check_range, ConfigManifest, ConfigSection, FieldManifest};
use crate::error::StratError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Runs averaged per genome when the scenario is stochastic
    pub repetitions: u32,
    pub max_match_frames: u32,
    /// Upper bound on evaluations running at once
    pub concurrency: usize,
    pub frames_per_decision: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            repetitions: 3,
            max_match_frames: 43_200,
            concurrency: 4,
            frames_per_decision: 24,
        }
    }
}

impl ConfigSection for EvaluationConfig {
    fn section_name() -> &'static str {
        "evaluation"
    }

    fn validate(&self) -> Result<(), StratError> {
        let section = Self::section_name();
        check_range(section, "repetitions", self.repetitions, 1, 1000)?;
        check_range(section, "max_match_frames", self.max_match_frames, 1, 10_000_000)?;
        check_range(section, "concurrency", self.concurrency, 1, 256)?;
        check_range(section, "frames_per_decision", self.frames_per_decision, 1, 1440)?;
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = Self::default();
        ConfigManifest {
            section: "Evaluation".to_string(),
            fields: vec![
                FieldManifest::new(
                    "repetitions",
                    "integer",
                    json!(defaults.repetitions),
                    Some(1.0),
                    Some(1000.0),
                    "Repetitions averaged for stochastic scenarios",
                ),
                FieldManifest::new(
                    "max_match_frames",
                    "integer",
                    json!(defaults.max_match_frames),
                    Some(1.0),
                    Some(10_000_000.0),
                    "Simulated frames before an undecided match counts as a timeout",
                ),
                FieldManifest::new(
                    "concurrency",
                    "integer",
                    json!(defaults.concurrency),
                    Some(1.0),
                    Some(256.0),
                    "Worker threads evaluating genomes in parallel",
                ),
                FieldManifest::new(
                    "frames_per_decision",
                    "integer",
                    json!(defaults.frames_per_decision),
                    Some(1.0),
                    Some(1440.0),
                    "Simulated frames between two plan executor steps",
                ),
            ],
        }
    }
}
