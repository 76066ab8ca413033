pub mod traits;
pub mod evolution;
pub mod evaluation;
pub mod execution;
pub mod manager;

pub use manager::{ConfigManager, AppConfig};
pub use evolution::{EvolutionConfig, SelectionMethod, CrossoverMethod};
pub use evaluation::EvaluationConfig;
pub use execution::ExecutionConfig;
pub use traits::{ConfigSection, ConfigManifest, FieldManifest};
