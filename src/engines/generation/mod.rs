pub mod evolution_engine;
pub mod export;
pub mod genome;
pub mod history;
pub mod operators;
pub mod progress;

pub use evolution_engine::{
    EvolutionEngine, EvolutionOutcome, OptimizerState, ProgressCallback, Termination,
};
pub use export::EvolutionRecord;
pub use genome::{Directive, DirectiveKind, Genome, TechState, Trigger};
pub use history::{FitnessHistory, GenerationStats};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, ProgressMessage};
