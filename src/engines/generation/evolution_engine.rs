use crate::config::{ConfigSection, EvolutionConfig, SelectionMethod};
use crate::engines::evaluation::{FitnessEvaluator, FitnessRecord, Scenario, ScenarioRunner};
use crate::engines::generation::{
    genome::{Directive, Genome, TechState},
    history::{FitnessHistory, GenerationStats},
    operators::*,
};
use crate::error::{Result, StratError};
use crate::types::GenomeId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};

/// Invalid offspring in a row before a random genome is used instead
const MAX_REJECTED_OFFSPRING: usize = 64;

pub trait ProgressCallback: Send {
    fn on_generation_start(&mut self, generation: usize);
    fn on_generation_complete(&mut self, stats: &GenerationStats);
    fn on_genome_evaluated(&mut self, evaluated: usize, total: usize);

    /// Whole evaluated population, best first
    fn on_population_evaluated(
        &mut self,
        _generation: usize,
        _population: &[(Arc<Genome>, FitnessRecord)],
    ) {
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerState {
    Initialize,
    Evaluate,
    Select,
    Recombine,
    Converged,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Ran all `max_generations`
    MaxGenerations,
    /// Best fitness stopped improving for `stall_generations`
    Stalled,
}

pub struct EvolutionOutcome {
    pub best: Arc<Genome>,
    pub best_record: FitnessRecord,
    pub history: FitnessHistory,
    pub termination: Termination,
    /// Last evaluated population, best first
    pub final_population: Vec<(Arc<Genome>, FitnessRecord)>,
}

/// Genome waiting for evaluation, or carried over with its record
type Individual = (Arc<Genome>, Option<FitnessRecord>);

pub struct EvolutionEngine<R: ScenarioRunner> {
    config: EvolutionConfig,
    evaluator: FitnessEvaluator<R>,
    scenario: Scenario,
    start: TechState,
    pool: rayon::ThreadPool,
    rng: StdRng,
    next_id: u64,
    state: OptimizerState,
}

impl<R: ScenarioRunner> EvolutionEngine<R> {
    pub fn new(
        config: EvolutionConfig,
        evaluator: FitnessEvaluator<R>,
        scenario: Scenario,
    ) -> Result<Self> {
        config.validate()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(evaluator.config().concurrency.max(1))
            .thread_name(|i| format!("evaluator-{}", i))
            .build()
            .map_err(|e| {
                StratError::Configuration(format!("Failed to build evaluation pool: {}", e))
            })?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start = scenario.tech_state();

        Ok(Self {
            config,
            evaluator,
            scenario,
            start,
            pool,
            rng,
            next_id: 1,
            state: OptimizerState::Initialize,
        })
    }

    pub fn state(&self) -> OptimizerState {
        self.state
    }

    /// Run the evolution process
    pub fn run<C: ProgressCallback>(&mut self, mut callback: C) -> Result<EvolutionOutcome> {
        self.state = OptimizerState::Initialize;
        let mut population = self.initialize_population();
        let mut history = FitnessHistory::new();
        let mut best: Option<(Arc<Genome>, FitnessRecord)> = None;

        for generation in 0..self.config.max_generations {
            callback.on_generation_start(generation);

            self.state = OptimizerState::Evaluate;
            let evaluated = match self.evaluate_population(generation, population, &mut callback) {
                Ok(evaluated) => evaluated,
                Err(e) => {
                    self.state = OptimizerState::Terminated;
                    log::error!("{}", e);
                    return Err(e);
                }
            };

            let stats = GenerationStats::summarize(generation, &evaluated);
            callback.on_population_evaluated(generation, &evaluated);
            callback.on_generation_complete(&stats);
            history.push(stats);

            if let Some((genome, record)) = evaluated.first() {
                let improved = best
                    .as_ref()
                    .map(|(_, current)| record.fitness > current.fitness)
                    .unwrap_or(true);
                if improved {
                    best = Some((Arc::clone(genome), record.clone()));
                }
            }

            let termination = if history.stalled(self.config.stall_generations, self.config.epsilon) {
                Some(Termination::Stalled)
            } else if generation + 1 == self.config.max_generations {
                Some(Termination::MaxGenerations)
            } else {
                None
            };

            if let Some(termination) = termination {
                self.state = match termination {
                    Termination::Stalled => OptimizerState::Converged,
                    Termination::MaxGenerations => OptimizerState::Terminated,
                };
                let (best, best_record) = best.ok_or_else(|| {
                    StratError::Configuration("Evolution finished without any evaluated genome".to_string())
                })?;
                log::info!(
                    "Evolution finished after {} generations ({:?}); best genome {} scored {:.4}",
                    history.len(),
                    termination,
                    best.id,
                    best_record.fitness
                );
                return Ok(EvolutionOutcome {
                    best,
                    best_record,
                    history,
                    termination,
                    final_population: evaluated,
                });
            }

            population = self.create_next_generation(&evaluated);
        }

        // max_generations >= 1 is enforced by config validation
        self.state = OptimizerState::Terminated;
        Err(StratError::Configuration(
            "max_generations must be at least 1".to_string(),
        ))
    }

    fn fresh_id(&mut self) -> GenomeId {
        let id = GenomeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn initialize_population(&mut self) -> Vec<Individual> {
        (0..self.config.population_size)
            .map(|_| {
                let id = self.fresh_id();
                let genome = random_genome(
                    id,
                    self.config.initial_genome_length,
                    &self.start,
                    &mut self.rng,
                );
                (Arc::new(genome), None)
            })
            .collect()
    }

    /// Score every individual lacking a record, in parallel.
    ///
    /// Each task answers on its own one-shot channel; results are read back
    /// in population order so the outcome does not depend on scheduling.
    fn evaluate_population<C: ProgressCallback>(
        &self,
        generation: usize,
        population: Vec<Individual>,
        callback: &mut C,
    ) -> Result<Vec<(Arc<Genome>, FitnessRecord)>> {
        let total = population.iter().filter(|(_, r)| r.is_none()).count();
        let mut receivers = Vec::with_capacity(total);

        self.pool.scope(|scope| {
            for (index, (genome, record)) in population.iter().enumerate() {
                if record.is_some() {
                    continue;
                }
                let (sender, receiver) = mpsc::sync_channel(1);
                receivers.push((index, receiver));

                let genome = Arc::clone(genome);
                let evaluator = &self.evaluator;
                let scenario = &self.scenario;
                scope.spawn(move |_| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        evaluator.evaluate(&genome, scenario)
                    }));
                    let _ = sender.send(result);
                });
            }
        });

        let mut records: Vec<Option<FitnessRecord>> =
            population.iter().map(|(_, r)| r.clone()).collect();

        for (done, (index, receiver)) in receivers.into_iter().enumerate() {
            let genome_id = population[index].0.id;
            let fault = |message: String| StratError::GenerationFailed {
                generation,
                source: Box::new(StratError::EvaluatorFault { genome_id, message }),
            };

            let record = match receiver.recv() {
                Ok(Ok(Ok(record))) => record,
                Ok(Ok(Err(e))) if e.is_recoverable() => {
                    log::warn!("Generation {}: {}; scored at minimum", generation, e);
                    FitnessRecord::failed(genome_id, &e)
                }
                Ok(Ok(Err(e))) => {
                    return Err(StratError::GenerationFailed {
                        generation,
                        source: Box::new(e),
                    })
                }
                Ok(Err(payload)) => return Err(fault(panic_message(payload.as_ref()))),
                Err(_) => return Err(fault("evaluation task ended without a result".to_string())),
            };
            records[index] = Some(record);
            callback.on_genome_evaluated(done + 1, total);
        }

        let mut evaluated: Vec<(Arc<Genome>, FitnessRecord)> = population
            .into_iter()
            .zip(records)
            .filter_map(|((genome, _), record)| record.map(|r| (genome, r)))
            .collect();
        evaluated.sort_by(|a, b| {
            b.1.fitness
                .partial_cmp(&a.1.fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(evaluated)
    }

    fn create_next_generation(&mut self, evaluated: &[(Arc<Genome>, FitnessRecord)]) -> Vec<Individual> {
        self.state = OptimizerState::Select;
        let size = self.config.population_size;
        let mut next_generation: Vec<Individual> = Vec::with_capacity(size);

        // Elitism: carry the top performers over untouched, records included
        for (genome, record) in evaluated.iter().take(self.config.elitism_count) {
            next_generation.push((Arc::clone(genome), Some(record.clone())));
        }

        let scored: Vec<(Arc<Genome>, f64)> = evaluated
            .iter()
            .map(|(genome, record)| (Arc::clone(genome), record.fitness))
            .collect();

        self.state = OptimizerState::Recombine;
        let mut rejected = 0;
        while next_generation.len() < size {
            for directives in self.breed(&scored) {
                if next_generation.len() >= size {
                    break;
                }
                let id = self.fresh_id();
                let child = Genome::new(id, directives);
                match child.validate(&self.start) {
                    Ok(()) => {
                        rejected = 0;
                        next_generation.push((Arc::new(child), None));
                    }
                    Err(e) => {
                        log::debug!("Discarding offspring: {}", e);
                        rejected += 1;
                        if rejected >= MAX_REJECTED_OFFSPRING {
                            rejected = 0;
                            let id = self.fresh_id();
                            let genome = random_genome(
                                id,
                                self.config.initial_genome_length,
                                &self.start,
                                &mut self.rng,
                            );
                            next_generation.push((Arc::new(genome), None));
                        }
                    }
                }
            }
        }

        next_generation.truncate(size);
        next_generation
    }

    /// One or two mutated children, not yet validated
    fn breed(&mut self, scored: &[(Arc<Genome>, f64)]) -> Vec<Vec<Directive>> {
        let mut children = if self.rng.gen::<f64>() < self.config.crossover_rate {
            let parent1 = self.select(scored);
            let parent2 = self.select(scored);
            let (child1, child2) = crossover(
                parent1.directives(),
                parent2.directives(),
                self.config.crossover.points(),
                &mut self.rng,
            );
            vec![child1, child2]
        } else {
            vec![self.select(scored).directives().to_vec()]
        };

        for child in children.iter_mut() {
            mutate(
                child,
                self.config.mutation_rate,
                &self.start,
                self.config.max_genome_length,
                &mut self.rng,
            );
        }
        children
    }

    fn select(&mut self, scored: &[(Arc<Genome>, f64)]) -> Arc<Genome> {
        match self.config.selection {
            SelectionMethod::Tournament { size } => {
                tournament_selection(scored, size, &mut self.rng)
            }
            SelectionMethod::Roulette => roulette_selection(scored, &mut self.rng),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("evaluator panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("evaluator panicked: {}", message)
    } else {
        "evaluator panicked".to_string()
    }
}
