use super::genome::Genome;
use crate::engines::evaluation::FitnessRecord;
use crate::types::GenomeId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Summary of one evaluated generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub worst_fitness: f64,
    pub best_genome_id: GenomeId,
    pub win_rate: f64,
    /// Genomes scored at the minimum because their evaluation failed
    pub failures: usize,
    pub population: usize,
}

impl GenerationStats {
    /// `evaluated` must be sorted best first and non-empty
    pub fn summarize(generation: usize, evaluated: &[(Arc<Genome>, FitnessRecord)]) -> Self {
        let count = evaluated.len().max(1) as f64;
        let fitness = evaluated.iter().map(|(_, r)| r.fitness);

        Self {
            generation,
            best_fitness: evaluated.first().map(|(_, r)| r.fitness).unwrap_or(0.0),
            mean_fitness: fitness.clone().sum::<f64>() / count,
            worst_fitness: evaluated.last().map(|(_, r)| r.fitness).unwrap_or(0.0),
            best_genome_id: evaluated
                .first()
                .map(|(g, _)| g.id)
                .unwrap_or(GenomeId(0)),
            win_rate: evaluated.iter().filter(|(_, r)| r.won).count() as f64 / count,
            failures: evaluated.iter().filter(|(_, r)| r.is_failure()).count(),
            population: evaluated.len(),
        }
    }
}

/// Append-only per-generation fitness table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessHistory {
    generations: Vec<GenerationStats>,
}

impl FitnessHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stats: GenerationStats) {
        self.generations.push(stats);
    }

    pub fn generations(&self) -> &[GenerationStats] {
        &self.generations
    }

    pub fn len(&self) -> usize {
        self.generations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }

    /// Highest best-fitness seen so far
    pub fn best_fitness(&self) -> Option<f64> {
        self.generations
            .iter()
            .map(|g| g.best_fitness)
            .fold(None, |best, f| Some(best.map_or(f, |b: f64| b.max(f))))
    }

    /// True when the last `window` generations each failed to beat the
    /// best fitness before them by more than `epsilon`.
    pub fn stalled(&self, window: usize, epsilon: f64) -> bool {
        if window == 0 || self.generations.len() <= window {
            return false;
        }

        let mut running_best = f64::NEG_INFINITY;
        let mut stalled_for = 0;
        for (i, stats) in self.generations.iter().enumerate() {
            if i > 0 && stats.best_fitness - running_best <= epsilon {
                stalled_for += 1;
            } else {
                stalled_for = 0;
            }
            running_best = running_best.max(stats.best_fitness);
        }
        stalled_for >= window
    }
}
