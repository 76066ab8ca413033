use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stratevo::config::ConfigManager;
use stratevo::engines::evaluation::{FitnessEvaluator, Scenario};
use stratevo::engines::generation::{ConsoleProgressCallback, EvolutionEngine, EvolutionRecord};

#[derive(Parser, Debug)]
#[command(name = "stratevo")]
#[command(about = "Evolve and inspect RTS build-order strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the genetic search and save the best genome with its history
    Evolve {
        /// TOML configuration; STRATEVO__SECTION__FIELD variables override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// passive_opponent, rush_defense or macro_game
        #[arg(long, default_value = "passive_opponent")]
        scenario: String,
        /// Seeds both the optimizer and the scenario
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "best_strategy.json")]
        out: PathBuf,
    },
    /// Print a saved evolution record
    Inspect { input: PathBuf },
    /// Print every configuration option, or write the defaults as TOML
    Config {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Evolve {
            config,
            scenario,
            seed,
            out,
        } => {
            let manager = ConfigManager::new();
            if let Some(path) = &config {
                manager
                    .load_from_file(path)
                    .with_context(|| format!("loading {}", path.display()))?;
            }
            let mut app_config = manager.get();
            if let Some(seed) = seed {
                app_config.evolution.seed = Some(seed);
            }

            let scenario = Scenario::by_name(&scenario, seed.unwrap_or(0)).ok_or_else(|| {
                anyhow!(
                    "unknown scenario '{}'. available: {}",
                    scenario,
                    Scenario::PRESETS.join(", ")
                )
            })?;

            let evaluator =
                FitnessEvaluator::simulated(app_config.evaluation.clone(), app_config.execution.clone());
            let mut engine = EvolutionEngine::new(app_config.evolution.clone(), evaluator, scenario.clone())?;
            let outcome = engine.run(ConsoleProgressCallback)?;

            let record = EvolutionRecord::from_outcome(&outcome, &scenario);
            record
                .save(&out)
                .with_context(|| format!("writing {}", out.display()))?;

            println!("scenario={}", scenario.name);
            println!("generations={}", outcome.history.len());
            println!("termination={:?}", outcome.termination);
            println!("best_genome={}", outcome.best.id);
            println!("best_fitness={:.4}", outcome.best_record.fitness);
            println!("won={}", outcome.best_record.won);
            println!("output={}", out.display());
        }
        Commands::Inspect { input } => {
            let record = EvolutionRecord::load(&input)
                .with_context(|| format!("reading {}", input.display()))?;

            println!("input={}", input.display());
            println!("exported_at={}", record.exported_at.to_rfc3339());
            println!("scenario={}", record.scenario.name);
            println!("best_genome={}", record.best_genome.id);
            println!("best_fitness={:.4}", record.best_record.fitness);
            println!("won={}", record.best_record.won);
            println!("win_rate={:.2}", record.best_record.win_rate);
            println!("efficiency={:.3}", record.best_record.resource_efficiency);
            if let Some(frame) = record.best_record.time_to_milestone {
                println!("first_attack_frame={}", frame);
            }
            for (index, directive) in record.best_genome.directives().iter().enumerate() {
                println!("  {:3} {:?}", index, directive);
            }
            for stats in record.history.generations() {
                println!(
                    "gen {:4}  best {:10.4}  mean {:10.4}  failures {}",
                    stats.generation + 1,
                    stats.best_fitness,
                    stats.mean_fitness,
                    stats.failures
                );
            }
        }
        Commands::Config { write } => {
            let manager = ConfigManager::new();
            if let Some(path) = write {
                manager
                    .save_to_file(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("wrote={}", path.display());
            } else {
                for manifest in manager.get().manifests() {
                    println!("[{}]", manifest.section);
                    for field in manifest.fields {
                        let range = match (field.min, field.max) {
                            (Some(min), Some(max)) => format!("[{}, {}]", min, max),
                            (Some(min), None) => format!("[{}, ..)", min),
                            _ => "-".to_string(),
                        };
                        println!(
                            "  {:28} {:8} default={:<14} range={:<18} {}",
                            field.name, field.field_type, field.default.to_string(), range, field.description
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
