use std::io::Write;
use stratevo::config::{ConfigManager, EvaluationConfig, EvolutionConfig, SelectionMethod};
use stratevo::engines::evaluation::{FitnessEvaluator, Scenario};
use stratevo::engines::generation::{
    ConsoleProgressCallback, EvolutionEngine, EvolutionRecord,
};
use stratevo::error::StratError;
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_evolution_record_survives_disk_roundtrip() {
    let scenario = Scenario::passive_opponent();
    let evaluation = EvaluationConfig {
        max_match_frames: 1500,
        concurrency: 2,
        ..EvaluationConfig::default()
    };
    let evolution = EvolutionConfig {
        population_size: 4,
        elitism_count: 1,
        max_generations: 2,
        initial_genome_length: 4,
        seed: Some(11),
        ..EvolutionConfig::default()
    };
    let evaluator = FitnessEvaluator::simulated(evaluation, Default::default());
    let mut engine = EvolutionEngine::new(evolution, evaluator, scenario.clone()).unwrap();
    let outcome = engine.run(ConsoleProgressCallback).unwrap();

    let record = EvolutionRecord::from_outcome(&outcome, &scenario);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("best.json");
    record.save(&path).unwrap();

    let loaded = EvolutionRecord::load(&path).unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.history.len(), 2);
    assert!(loaded
        .best_genome
        .validate(&scenario.tech_state())
        .is_ok());
}

#[test]
fn test_unknown_record_version_is_rejected() {
    let json = r#"{"format_version": 99}"#;
    assert!(EvolutionRecord::from_json(json).is_err());
}

#[test]
fn test_load_config_from_file() {
    let file = toml_file(
        r#"
        [evolution]
        population_size = 24
        elitism_count = 3
        selection = { kind = "tournament", size = 4 }

        [evaluation]
        repetitions = 5
        "#,
    );

    let manager = ConfigManager::new();
    manager.load_from_file(file.path()).unwrap();
    let config = manager.get();

    assert_eq!(config.evolution.population_size, 24);
    assert_eq!(config.evolution.elitism_count, 3);
    assert_eq!(config.evolution.selection, SelectionMethod::Tournament { size: 4 });
    assert_eq!(config.evaluation.repetitions, 5);
    assert_eq!(config.evaluation.max_match_frames, 43_200);
}

#[test]
fn test_out_of_range_config_fails_fast() {
    let file = toml_file(
        r#"
        [evolution]
        mutation_rate = 1.5
        "#,
    );

    let manager = ConfigManager::new();
    let result = manager.load_from_file(file.path());
    assert!(matches!(result, Err(StratError::Configuration(_))));
    assert_eq!(manager.get().evolution.mutation_rate, 0.1);
}

#[test]
fn test_environment_overrides_file() {
    std::env::set_var("STRATEVO__EXECUTION__CONSTRUCTION_GRACE_FRAMES", "240");
    let file = toml_file(
        r#"
        [execution]
        construction_grace_frames = 600
        "#,
    );

    let manager = ConfigManager::new();
    manager.load_from_file(file.path()).unwrap();
    std::env::remove_var("STRATEVO__EXECUTION__CONSTRUCTION_GRACE_FRAMES");

    assert_eq!(manager.get().execution.construction_grace_frames, 240);
}

#[test]
fn test_saved_defaults_load_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stratevo.toml");

    let manager = ConfigManager::new();
    manager.save_to_file(&path).unwrap();

    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&path).unwrap();
    assert_eq!(reloaded.get().evolution, manager.get().evolution);
    assert_eq!(reloaded.get().evaluation, manager.get().evaluation);
}
