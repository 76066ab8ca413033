use crate::types::GenomeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StratError {
    #[error("Invalid genome {genome_id}: directive {index}: {reason}")]
    InvalidGenome {
        genome_id: GenomeId,
        index: usize,
        reason: String,
    },

    #[error("Evaluation of genome {genome_id} timed out after {frames} frames")]
    EvaluationTimeout { genome_id: GenomeId, frames: u32 },

    #[error("Evaluator fault on genome {genome_id}: {message}")]
    EvaluatorFault { genome_id: GenomeId, message: String },

    #[error("Generation {generation} failed: {source}")]
    GenerationFailed {
        generation: usize,
        #[source]
        source: Box<StratError>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StratError {
    /// Failures that cost a genome its score but leave the generation intact.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StratError::InvalidGenome { .. } | StratError::EvaluationTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StratError>;
