use super::evolution_engine::ProgressCallback;
use super::history::GenerationStats;
use std::sync::mpsc::Sender;

/// Reports progress through the `log` facade
pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::info!("Generation {} starting...", generation + 1);
    }

    fn on_generation_complete(&mut self, stats: &GenerationStats) {
        log::info!(
            "Generation {} complete. Best fitness: {:.4}, mean: {:.4}, failures: {}",
            stats.generation + 1,
            stats.best_fitness,
            stats.mean_fitness,
            stats.failures
        );
    }

    fn on_genome_evaluated(&mut self, evaluated: usize, total: usize) {
        if evaluated % 10 == 0 || evaluated == total {
            log::debug!("  Evaluated {}/{} genomes", evaluated, total);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete(GenerationStats),
    GenomeEvaluated { current: usize, total: usize },
}

/// Forwards progress to another thread
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, stats: &GenerationStats) {
        let _ = self
            .sender
            .send(ProgressMessage::GenerationComplete(stats.clone()));
    }

    fn on_genome_evaluated(&mut self, evaluated: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::GenomeEvaluated {
            current: evaluated,
            total,
        });
    }
}
