pub mod budget;
pub mod cursor;
pub mod events;
pub mod executor;
pub mod reservation;
pub mod runtime;

pub use cursor::ExecutionCursor;
pub use events::{CommandOrigin, ExecutionEvent, Unsatisfiable};
pub use executor::{FrameOutput, IssuedCommand, PlanExecutor};
pub use reservation::ResourceReservation;
pub use runtime::{BotRuntime, FrameReport, GameEngine};
