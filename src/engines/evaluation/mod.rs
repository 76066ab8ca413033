pub mod combat;
pub mod evaluator;
pub mod fitness;
pub mod scenario;
pub mod simulator;

pub use evaluator::FitnessEvaluator;
pub use fitness::{FitnessRecord, MIN_FITNESS};
pub use scenario::{MatchLimits, MatchOutcome, OpponentProfile, Scenario, ScenarioRunner, StartingState};
pub use simulator::{MatchSimulator, SimulationRunner};
