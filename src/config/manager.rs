use super::{
    evaluation::EvaluationConfig, evolution::EvolutionConfig, execution::ExecutionConfig,
    traits::{ConfigManifest, ConfigSection},
};
use crate::error::StratError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix for environment overrides, e.g. `STRATEVO__EVOLUTION__POPULATION_SIZE=80`
pub const ENV_PREFIX: &str = "STRATEVO";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub evaluation: EvaluationConfig,
    pub execution: ExecutionConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), StratError> {
        self.evolution.validate()?;
        self.evaluation.validate()?;
        self.execution.validate()?;
        Ok(())
    }

    pub fn manifests(&self) -> Vec<ConfigManifest> {
        vec![
            self.evolution.to_manifest(),
            self.evaluation.to_manifest(),
            self.execution.to_manifest(),
        ]
    }

    /// Parse TOML text and validate it
    pub fn from_toml_str(contents: &str) -> Result<Self, StratError> {
        let config: AppConfig = toml::from_str(contents)
            .map_err(|e| StratError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Load a TOML file layered with environment overrides.
    ///
    /// Out-of-range values fail here, before anything runs.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StratError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| StratError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| StratError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        log::info!("Loaded configuration from {}", path.as_ref().display());

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), StratError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| StratError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| StratError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Apply `f` and keep the result only if it still validates
    pub fn update<F>(&self, f: F) -> Result<(), StratError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = config.clone();
        f(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::evolution::SelectionMethod;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [evolution]
            population_size = 12
            selection = { kind = "roulette" }

            [execution]
            frame_budget_ms = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.evolution.population_size, 12);
        assert_eq!(config.evolution.selection, SelectionMethod::Roulette);
        assert_eq!(config.execution.frame_budget_ms, 8);
        assert_eq!(config.evaluation, EvaluationConfig::default());
    }

    #[test]
    fn test_invalid_update_is_discarded() {
        let manager = ConfigManager::new();
        let result = manager.update(|c| c.evaluation.repetitions = 0);
        assert!(result.is_err());
        assert_eq!(manager.get().evaluation.repetitions, 3);
    }
}
