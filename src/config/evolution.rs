use super::traits::{check_range, ConfigManifest, ConfigSection, FieldManifest};
use crate::error::StratError;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub elitism_count: usize,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    pub selection: SelectionMethod,
    pub crossover: CrossoverMethod,
    pub max_generations: usize,
    pub stall_generations: usize,
    pub epsilon: f64,
    pub initial_genome_length: usize,
    pub max_genome_length: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SelectionMethod {
    Tournament { size: usize },
    Roulette,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CrossoverMethod {
    SinglePoint,
    MultiPoint { points: usize },
}

impl CrossoverMethod {
    pub fn points(&self) -> usize {
        match self {
            CrossoverMethod::SinglePoint => 1,
            CrossoverMethod::MultiPoint { points } => *points,
        }
    }
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 40,
            elitism_count: 2,
            mutation_rate: 0.1,
            crossover_rate: 0.8,
            selection: SelectionMethod::Tournament { size: 3 },
            crossover: CrossoverMethod::SinglePoint,
            max_generations: 50,
            stall_generations: 10,
            epsilon: 1e-6,
            initial_genome_length: 10,
            max_genome_length: 64,
            seed: None,
        }
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), StratError> {
        let section = Self::section_name();
        check_range(section, "population_size", self.population_size, 4, 10_000)?;
        if self.elitism_count >= self.population_size {
            return Err(StratError::Configuration(format!(
                "evolution.elitism_count must be below population_size ({}), got {}",
                self.population_size, self.elitism_count
            )));
        }
        check_range(section, "mutation_rate", self.mutation_rate, 0.0, 1.0)?;
        check_range(section, "crossover_rate", self.crossover_rate, 0.0, 1.0)?;
        if let SelectionMethod::Tournament { size } = self.selection {
            check_range(section, "selection.size", size, 1, self.population_size)?;
        }
        check_range(section, "crossover.points", self.crossover.points(), 1, 8)?;
        check_range(section, "max_generations", self.max_generations, 1, 100_000)?;
        check_range(section, "stall_generations", self.stall_generations, 1, 100_000)?;
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(StratError::Configuration(format!(
                "evolution.epsilon must be a finite value >= 0, got {}",
                self.epsilon
            )));
        }
        check_range(section, "max_genome_length", self.max_genome_length, 1, 4096)?;
        check_range(
            section,
            "initial_genome_length",
            self.initial_genome_length,
            1,
            self.max_genome_length,
        )?;
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        let defaults = Self::default();
        ConfigManifest {
            section: "Evolution".to_string(),
            fields: vec![
                FieldManifest::new(
                    "population_size",
                    "integer",
                    json!(defaults.population_size),
                    Some(4.0),
                    Some(10_000.0),
                    "Genomes per generation, constant across generations",
                ),
                FieldManifest::new(
                    "elitism_count",
                    "integer",
                    json!(defaults.elitism_count),
                    Some(0.0),
                    None,
                    "Top genomes copied unchanged into the next generation (< population_size)",
                ),
                FieldManifest::new(
                    "mutation_rate",
                    "float",
                    json!(defaults.mutation_rate),
                    Some(0.0),
                    Some(1.0),
                    "Per-directive mutation probability",
                ),
                FieldManifest::new(
                    "crossover_rate",
                    "float",
                    json!(defaults.crossover_rate),
                    Some(0.0),
                    Some(1.0),
                    "Probability that offspring come from crossover rather than a copy",
                ),
                FieldManifest::new(
                    "selection",
                    "tournament{size} | roulette",
                    json!(defaults.selection),
                    Some(1.0),
                    None,
                    "Parent selection; tournament size must not exceed population_size",
                ),
                FieldManifest::new(
                    "crossover",
                    "single_point | multi_point{points}",
                    json!(defaults.crossover),
                    Some(1.0),
                    Some(8.0),
                    "Splice points, always on directive boundaries",
                ),
                FieldManifest::new(
                    "max_generations",
                    "integer",
                    json!(defaults.max_generations),
                    Some(1.0),
                    Some(100_000.0),
                    "Hard stop on the number of generations",
                ),
                FieldManifest::new(
                    "stall_generations",
                    "integer",
                    json!(defaults.stall_generations),
                    Some(1.0),
                    Some(100_000.0),
                    "Stop after this many generations without improvement above epsilon",
                ),
                FieldManifest::new(
                    "epsilon",
                    "float",
                    json!(defaults.epsilon),
                    Some(0.0),
                    None,
                    "Minimum best-fitness gain that counts as improvement",
                ),
                FieldManifest::new(
                    "initial_genome_length",
                    "integer",
                    json!(defaults.initial_genome_length),
                    Some(1.0),
                    None,
                    "Directives per randomly initialised genome (<= max_genome_length)",
                ),
                FieldManifest::new(
                    "max_genome_length",
                    "integer",
                    json!(defaults.max_genome_length),
                    Some(1.0),
                    Some(4096.0),
                    "Upper bound on directives after crossover and mutation",
                ),
                FieldManifest::new(
                    "seed",
                    "integer (optional)",
                    json!(defaults.seed),
                    Some(0.0),
                    None,
                    "Optimizer RNG seed; random when unset",
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(EvolutionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_values_fail() {
        let config = EvolutionConfig {
            mutation_rate: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvolutionConfig {
            elitism_count: 40,
            population_size: 40,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvolutionConfig {
            selection: SelectionMethod::Tournament { size: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EvolutionConfig {
            epsilon: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
