//! Run configuration.

use forja_eval::FitnessConfig;
use forja_evolve::EvolutionConfig;
use forja_expr::RegistryOptions;
use forja_registry::RegistryConfig;
use forja_traits::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything a mining run is configured with.
///
/// Every section is optional in the JSON form and falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Search parameters.
    pub evolution: EvolutionConfig,
    /// Scoring parameters.
    pub fitness: FitnessConfig,
    /// Promotion thresholds and wrapper settings.
    pub registry: RegistryConfig,
    /// Operators, windows and constants available to the search.
    pub primitives: RegistryOptions,
}

impl MiningConfig {
    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.evolution.validate()?;
        self.fitness.validate()?;
        self.registry.validate()?;
        self.primitives.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MiningConfig::from_json(
            r#"{"evolution": {"population_size": 64, "seed": 3}, "fitness": {"mode": "portfolio"}}"#,
        )
        .unwrap();
        assert_eq!(config.evolution.population_size, 64);
        assert_eq!(config.evolution.seed, Some(3));
        assert_eq!(config.evolution.generations, EvolutionConfig::default().generations);
        assert_eq!(config.registry, RegistryConfig::default());
    }

    #[test]
    fn test_invalid_sections_fail_fast() {
        assert!(MiningConfig::from_json(r#"{"evolution": {"population_size": 1}}"#).is_err());
        assert!(
            MiningConfig::from_json(r#"{"registry": {"moderate_threshold": 9, "high_threshold": 1}}"#)
                .is_err()
        );
        assert!(MiningConfig::from_json("{").is_err());
    }
}
