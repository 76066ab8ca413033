use super::evolution_engine::EvolutionOutcome;
use super::genome::Genome;
use super::history::FitnessHistory;
use crate::engines::evaluation::{FitnessRecord, Scenario};
use crate::error::{Result, StratError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const FORMAT_VERSION: u32 = 1;

/// Best genome plus the generation-indexed fitness table, as saved to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub scenario: Scenario,
    pub best_genome: Genome,
    pub best_record: FitnessRecord,
    pub history: FitnessHistory,
}

impl EvolutionRecord {
    pub fn from_outcome(outcome: &EvolutionOutcome, scenario: &Scenario) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            exported_at: Utc::now(),
            scenario: scenario.clone(),
            best_genome: outcome.best.as_ref().clone(),
            best_record: outcome.best_record.clone(),
            history: outcome.history.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: EvolutionRecord = serde_json::from_str(json)?;
        if record.format_version != FORMAT_VERSION {
            return Err(StratError::Configuration(format!(
                "Unsupported record format version {} (expected {})",
                record.format_version, FORMAT_VERSION
            )));
        }
        Ok(record)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        log::info!("Saved evolution record to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
