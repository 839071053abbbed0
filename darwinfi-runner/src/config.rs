//! Evolution configuration: TOML-loadable, validated before use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fitness::FitnessWeights;
use crate::operators::{CrossoverPolicy, GeneOverrides};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-scenario simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    /// Periods simulated per scenario. Recorded scenarios run at most this many.
    pub periods: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            periods: 30,
        }
    }
}

/// Complete evolution configuration.
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionConfig {
    // ── Population ──
    pub population_size: usize,
    pub elite_fraction: f64,
    pub selection_rate: f64,

    // ── Operators ──
    pub mutation_rate: f64,
    pub mutation_magnitude: f64,
    pub crossover_rate: f64,
    pub specialization_rate: f64,

    // ── Limits ──
    pub max_generations: Option<u32>,
    /// Stop `evolve` once the best-ever fitness has not improved for this many generations.
    pub stagnation_limit: Option<u32>,

    // ── Seeding & threading ──
    pub random_seed: Option<u64>,
    pub eval_threads: usize,

    // ── Nested tables ──
    pub simulation: SimulationConfig,
    pub weights: FitnessWeights,
    pub crossover: CrossoverPolicy,
    /// Caller overrides applied on top of each condition's preset when specializing.
    pub specialization_overrides: GeneOverrides,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            elite_fraction: 0.1,
            selection_rate: 0.3,
            mutation_rate: 0.15,
            mutation_magnitude: 0.1,
            crossover_rate: 0.7,
            specialization_rate: 0.1,
            max_generations: None,
            stagnation_limit: None,
            random_seed: None,
            eval_threads: 1,
            simulation: SimulationConfig::default(),
            weights: FitnessWeights::default(),
            crossover: CrossoverPolicy::default(),
            specialization_overrides: GeneOverrides::default(),
        }
    }
}

impl EvolutionConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population_size == 0 {
            return Err(invalid("population_size must be at least 1"));
        }
        check_unit("elite_fraction", self.elite_fraction)?;
        check_unit("selection_rate", self.selection_rate)?;
        if self.selection_rate == 0.0 {
            return Err(invalid("selection_rate must be greater than 0"));
        }
        check_unit("mutation_rate", self.mutation_rate)?;
        check_unit("mutation_magnitude", self.mutation_magnitude)?;
        check_unit("crossover_rate", self.crossover_rate)?;
        check_unit("specialization_rate", self.specialization_rate)?;
        if !self.simulation.initial_capital.is_finite() || self.simulation.initial_capital <= 0.0 {
            return Err(invalid(format!(
                "simulation.initial_capital must be positive, got {}",
                self.simulation.initial_capital
            )));
        }
        if self.simulation.periods == 0 {
            return Err(invalid("simulation.periods must be at least 1"));
        }
        self.weights.validate().map_err(invalid)?;
        self.specialization_overrides.validate().map_err(invalid)?;
        Ok(())
    }

    /// The configured seed, or one derived from the current time.
    pub fn resolve_seed(&self) -> u64 {
        self.random_seed.unwrap_or_else(|| {
            let now = chrono::Utc::now();
            now.timestamp_nanos_opt()
                .map(|n| n as u64)
                .unwrap_or(now.timestamp() as u64)
        })
    }

    /// Number of genomes carried over unchanged from a population of `size`.
    pub fn elite_count(&self, size: usize) -> usize {
        ((size as f64 * self.elite_fraction).ceil() as usize).min(size)
    }

    /// Number of top genomes eligible as parents in a population of `size`.
    pub fn parent_count(&self, size: usize) -> usize {
        ((size as f64 * self.selection_rate).floor() as usize).min(size)
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

fn check_unit(name: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(invalid(format!("{name} must be within [0, 1], got {value}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::GeneCrossover;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.population_size, 20);
        assert_eq!(config.simulation.periods, 30);
        assert_eq!(config.simulation.initial_capital, 10_000.0);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = EvolutionConfig::from_toml_str("").unwrap();
        assert_eq!(config, EvolutionConfig::default());
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let text = r#"
            population_size = 50
            random_seed = 42
            max_generations = 100

            [simulation]
            periods = 60

            [crossover]
            leverage = "average"
        "#;
        let config = EvolutionConfig::from_toml_str(text).unwrap();
        assert_eq!(config.population_size, 50);
        assert_eq!(config.random_seed, Some(42));
        assert_eq!(config.max_generations, Some(100));
        assert_eq!(config.simulation.periods, 60);
        assert_eq!(config.simulation.initial_capital, 10_000.0);
        assert_eq!(config.crossover.leverage, GeneCrossover::Average);
        assert_eq!(config.crossover.rebalance_hours, GeneCrossover::Inherit);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = EvolutionConfig::from_toml_str("populaton_size = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rates_out_of_range_are_rejected() {
        let err = EvolutionConfig::from_toml_str("mutation_rate = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = EvolutionConfig::from_toml_str("selection_rate = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_population_is_rejected() {
        assert!(EvolutionConfig::from_toml_str("population_size = 0").is_err());
    }

    #[test]
    fn elite_and_parent_counts() {
        let config = EvolutionConfig::default();
        assert_eq!(config.elite_count(20), 2);
        assert_eq!(config.parent_count(20), 6);
        assert_eq!(config.elite_count(1), 1);
        assert_eq!(config.parent_count(1), 0);
        assert_eq!(config.elite_count(15), 2);
    }

    #[test]
    fn explicit_seed_is_used() {
        let config = EvolutionConfig {
            random_seed: Some(7),
            ..Default::default()
        };
        assert_eq!(config.resolve_seed(), 7);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "population_size = 8\nrandom_seed = 1").unwrap();
        let config = EvolutionConfig::load(file.path()).unwrap();
        assert_eq!(config.population_size, 8);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = EvolutionConfig::load(Path::new("/nonexistent/darwinfi.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn toml_round_trip() {
        let config = EvolutionConfig {
            random_seed: Some(3),
            max_generations: Some(12),
            ..Default::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(EvolutionConfig::from_toml_str(&text).unwrap(), config);
    }
}
