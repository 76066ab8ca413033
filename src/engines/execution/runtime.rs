use super::events::ExecutionEvent;
use super::executor::{IssuedCommand, PlanExecutor};
use crate::engines::generation::genome::Genome;
use crate::types::{Command, CommandAck};
use crate::world::WorldSnapshot;
use std::sync::Arc;

/// The game-engine side of the bot: snapshots out, commands in.
pub trait GameEngine {
    fn current_snapshot(&mut self) -> WorldSnapshot;

    /// Rejection is a normal answer, not an error
    fn submit(&mut self, command: &Command) -> CommandAck;
}

/// Everything that happened during one frame
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u32,
    pub submitted: Vec<IssuedCommand>,
    pub accepted: usize,
    pub rejected: usize,
    pub events: Vec<ExecutionEvent>,
    pub deferred: bool,
}

/// Drives a [`PlanExecutor`] against a [`GameEngine`], one frame per call.
pub struct BotRuntime<E: GameEngine> {
    engine: E,
    executor: PlanExecutor,
    last_snapshot: Option<Arc<WorldSnapshot>>,
}

impl<E: GameEngine> BotRuntime<E> {
    pub fn new(engine: E, executor: PlanExecutor) -> Self {
        Self {
            engine,
            executor,
            last_snapshot: None,
        }
    }

    /// Takes effect between frames
    pub fn activate(&mut self, genome: Arc<Genome>) {
        self.executor.activate(genome);
    }

    pub fn on_frame(&mut self) -> FrameReport {
        let snapshot = Arc::new(self.engine.current_snapshot());
        let output = self.executor.advance(&snapshot);

        let mut report = FrameReport {
            frame: output.frame,
            events: output.events,
            deferred: output.deferred,
            ..FrameReport::default()
        };

        for issued in output.commands {
            let ack = self.engine.submit(&issued.command);
            match ack {
                CommandAck::Accepted => report.accepted += 1,
                CommandAck::Rejected(_) => report.rejected += 1,
            }
            if let Some(event) = self.executor.report(&issued, ack) {
                report.events.push(event);
            }
            report.submitted.push(issued);
        }

        self.last_snapshot = Some(snapshot);
        report
    }

    /// Shared read-only view of the last frame, for diagnostics
    pub fn last_snapshot(&self) -> Option<Arc<WorldSnapshot>> {
        self.last_snapshot.clone()
    }

    pub fn executor(&self) -> &PlanExecutor {
        &self.executor
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn into_engine(self) -> E {
        self.engine
    }
}
