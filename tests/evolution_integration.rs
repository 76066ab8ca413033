use std::sync::Arc;
use stratevo::config::{EvaluationConfig, EvolutionConfig};
use stratevo::engines::evaluation::{
    FitnessEvaluator, FitnessRecord, MatchLimits, MatchOutcome, Scenario, ScenarioRunner,
    MIN_FITNESS,
};
use stratevo::engines::generation::{
    Directive, EvolutionEngine, GenerationStats, Genome, OptimizerState, ProgressCallback,
    Termination,
};
use stratevo::error::{Result, StratError};
use stratevo::types::UnitKind;

/// Records every evaluated population, best first
#[derive(Default)]
struct TestProgressCallback {
    populations: Vec<Vec<(Arc<Genome>, FitnessRecord)>>,
    completed: Vec<GenerationStats>,
}

impl ProgressCallback for &mut TestProgressCallback {
    fn on_generation_start(&mut self, _generation: usize) {}

    fn on_generation_complete(&mut self, stats: &GenerationStats) {
        println!(
            "Generation {}: best {:.2}, mean {:.2}",
            stats.generation + 1,
            stats.best_fitness,
            stats.mean_fitness
        );
        self.completed.push(stats.clone());
    }

    fn on_genome_evaluated(&mut self, _evaluated: usize, _total: usize) {}

    fn on_population_evaluated(
        &mut self,
        _generation: usize,
        population: &[(Arc<Genome>, FitnessRecord)],
    ) {
        self.populations.push(population.to_vec());
    }
}

fn worker_orders(genome: &Genome) -> u32 {
    genome
        .directives()
        .iter()
        .filter(|d| {
            matches!(
                d,
                Directive::ProduceUnit {
                    unit: UnitKind::Worker,
                    ..
                }
            )
        })
        .count() as u32
}

/// Cheap stand-in for a match: more worker orders win sooner
struct EconomyRunner;

impl ScenarioRunner for EconomyRunner {
    fn run(
        &self,
        genome: Arc<Genome>,
        _scenario: &Scenario,
        _seed: u64,
        limits: &MatchLimits,
    ) -> Result<MatchOutcome> {
        let workers = worker_orders(&genome);
        let end_frame = limits.max_match_frames.saturating_sub(1_000 * workers).max(1_000);
        let spent = (workers as u64 * 50).min(1_000);
        Ok(MatchOutcome {
            won: workers >= 3,
            end_frame,
            gathered: 1_000,
            spent,
            resource_curve: vec![0, spent / 2, spent],
            first_attack_frame: None,
            peak_army: 0.0,
            timed_out: false,
        })
    }
}

/// Every genome plays the same match
struct ConstantRunner;

impl ScenarioRunner for ConstantRunner {
    fn run(
        &self,
        _genome: Arc<Genome>,
        _scenario: &Scenario,
        _seed: u64,
        _limits: &MatchLimits,
    ) -> Result<MatchOutcome> {
        Ok(MatchOutcome {
            won: false,
            end_frame: 10_000,
            gathered: 500,
            spent: 250,
            resource_curve: vec![0, 250],
            first_attack_frame: None,
            peak_army: 0.0,
            timed_out: false,
        })
    }
}

/// Times out on even genome ids
struct FlakyRunner;

impl ScenarioRunner for FlakyRunner {
    fn run(
        &self,
        genome: Arc<Genome>,
        scenario: &Scenario,
        seed: u64,
        limits: &MatchLimits,
    ) -> Result<MatchOutcome> {
        if genome.id.0 % 2 == 0 {
            return Err(StratError::EvaluationTimeout {
                genome_id: genome.id,
                frames: limits.max_match_frames,
            });
        }
        EconomyRunner.run(genome, scenario, seed, limits)
    }
}

struct CrashingRunner;

impl ScenarioRunner for CrashingRunner {
    fn run(
        &self,
        genome: Arc<Genome>,
        scenario: &Scenario,
        seed: u64,
        limits: &MatchLimits,
    ) -> Result<MatchOutcome> {
        if genome.id.0 == 3 {
            panic!("simulator lost its connection");
        }
        ConstantRunner.run(genome, scenario, seed, limits)
    }
}

fn create_test_evolution_config() -> EvolutionConfig {
    EvolutionConfig {
        population_size: 12,
        elitism_count: 2,
        max_generations: 5,
        stall_generations: 100,
        initial_genome_length: 8,
        max_genome_length: 24,
        seed: Some(7),
        ..EvolutionConfig::default()
    }
}

fn create_test_evaluation_config() -> EvaluationConfig {
    EvaluationConfig {
        concurrency: 4,
        max_match_frames: 20_000,
        ..EvaluationConfig::default()
    }
}

fn engine<R: ScenarioRunner>(runner: R, config: EvolutionConfig) -> EvolutionEngine<R> {
    let evaluator = FitnessEvaluator::new(runner, create_test_evaluation_config());
    EvolutionEngine::new(config, evaluator, Scenario::passive_opponent()).unwrap()
}

#[test]
fn test_population_size_and_validity_hold_every_generation() {
    let scenario = Scenario::passive_opponent();
    let mut callback = TestProgressCallback::default();
    let mut engine = engine(EconomyRunner, create_test_evolution_config());

    let outcome = engine.run(&mut callback).unwrap();

    assert_eq!(outcome.termination, Termination::MaxGenerations);
    assert_eq!(engine.state(), OptimizerState::Terminated);
    assert_eq!(callback.populations.len(), 5);
    assert_eq!(callback.completed.len(), 5);
    for population in &callback.populations {
        assert_eq!(population.len(), 12);
        for (genome, record) in population {
            assert!(genome.validate(&scenario.tech_state()).is_ok());
            assert_eq!(record.genome_id, genome.id);
        }
    }
}

#[test]
fn test_elites_survive_unchanged() {
    let mut callback = TestProgressCallback::default();
    let mut engine = engine(EconomyRunner, create_test_evolution_config());
    engine.run(&mut callback).unwrap();

    for window in callback.populations.windows(2) {
        let (current, next) = (&window[0], &window[1]);
        for (elite, record) in current.iter().take(2) {
            let carried = next
                .iter()
                .find(|(genome, _)| genome.id == elite.id)
                .expect("elite missing from the next generation");
            assert!(carried.0.same_plan(elite));
            assert_eq!(carried.1.fitness, record.fitness);
        }
    }
}

#[test]
fn test_best_fitness_never_regresses() {
    let mut callback = TestProgressCallback::default();
    let mut engine = engine(EconomyRunner, create_test_evolution_config());
    let outcome = engine.run(&mut callback).unwrap();

    let best: Vec<f64> = outcome
        .history
        .generations()
        .iter()
        .map(|g| g.best_fitness)
        .collect();
    assert!(best.windows(2).all(|w| w[1] >= w[0]));
    assert_eq!(Some(outcome.best_record.fitness), outcome.history.best_fitness());
}

#[test]
fn test_same_seed_reproduces_the_run() {
    let first = engine(EconomyRunner, create_test_evolution_config())
        .run(&mut TestProgressCallback::default())
        .unwrap();
    let second = engine(EconomyRunner, create_test_evolution_config())
        .run(&mut TestProgressCallback::default())
        .unwrap();

    assert_eq!(first.history, second.history);
    assert_eq!(first.best.id, second.best.id);
    assert!(first.best.same_plan(&second.best));
}

#[test]
fn test_flat_fitness_converges() {
    let config = EvolutionConfig {
        stall_generations: 2,
        max_generations: 20,
        ..create_test_evolution_config()
    };
    let mut engine = engine(ConstantRunner, config);
    let outcome = engine.run(&mut TestProgressCallback::default()).unwrap();

    assert_eq!(outcome.termination, Termination::Stalled);
    assert_eq!(engine.state(), OptimizerState::Converged);
    assert_eq!(outcome.history.len(), 3);
}

#[test]
fn test_timeouts_score_minimum_without_aborting() {
    let mut callback = TestProgressCallback::default();
    let mut engine = engine(FlakyRunner, create_test_evolution_config());
    let outcome = engine.run(&mut callback).unwrap();

    let first = &callback.populations[0];
    let failed: Vec<&FitnessRecord> = first
        .iter()
        .map(|(_, record)| record)
        .filter(|record| record.is_failure())
        .collect();
    assert_eq!(failed.len(), 6);
    assert!(failed.iter().all(|record| record.fitness == MIN_FITNESS));
    assert_eq!(first.last().map(|(_, r)| r.fitness), Some(MIN_FITNESS));
    assert!(!outcome.best_record.is_failure());
    assert_eq!(outcome.history.generations()[0].failures, 6);
}

#[test]
fn test_evaluator_crash_fails_the_generation() {
    let mut engine = engine(CrashingRunner, create_test_evolution_config());
    let result = engine.run(&mut TestProgressCallback::default());

    match result {
        Err(StratError::GenerationFailed { generation, source }) => {
            assert_eq!(generation, 0);
            assert!(matches!(*source, StratError::EvaluatorFault { .. }));
        }
        other => panic!("expected a failed generation, got {:?}", other.map(|o| o.best.id)),
    }
    assert_eq!(engine.state(), OptimizerState::Terminated);
}

#[test]
fn test_invalid_config_is_rejected_up_front() {
    let config = EvolutionConfig {
        elitism_count: 12,
        ..create_test_evolution_config()
    };
    let evaluator = FitnessEvaluator::new(ConstantRunner, create_test_evaluation_config());
    let result = EvolutionEngine::new(config, evaluator, Scenario::passive_opponent());
    assert!(matches!(result, Err(StratError::Configuration(_))));
}
