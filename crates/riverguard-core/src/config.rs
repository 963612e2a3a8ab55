//! Configuration loading and typed config structures for riverguard.
//!
//! The configuration lives in `riverguard.yaml` in the working directory.
//! Every field has a default equal to the values the exploration has always
//! run with, so an absent file or an empty document yields a working setup:
//! formulation 3, 50 scenarios x 4 policies, 20 function evaluations over
//! the levers, epsilons at 20% of the observed range with a `1e-5` floor.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::formulation::ProblemFormulation;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid config: {message}")]
    Invalid {
        /// Which value is unusable and why.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
///
/// Mirrors the structure of `riverguard.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RiverguardConfig {
    /// Orchestration parameters (formulation, batch sizes, budget).
    #[serde(default)]
    pub exploration: ExplorationConfig,

    /// Epsilon derivation heuristic.
    #[serde(default)]
    pub epsilon: EpsilonConfig,

    /// Reference scenario construction.
    #[serde(default)]
    pub reference: ReferenceConfig,

    /// Connection settings for the external workbench.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RiverguardConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `NATS_URL` in the environment overrides `infrastructure.nats_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value fails validation.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.infrastructure.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Check every section for unusable values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.exploration.validate()?;
        self.epsilon.validate()?;
        if self.reference.scenario_name.trim().is_empty() {
            return Err(invalid("reference.scenario_name must not be empty"));
        }
        if self.infrastructure.request_timeout_ms == 0 {
            return Err(invalid("infrastructure.request_timeout_ms must be positive"));
        }
        Ok(())
    }
}

/// Which inputs the optimizer searches over.
///
/// The optimization pins the uncertainties to the reference scenario, so
/// the levers are the only searchable inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOver {
    /// Search the policy levers with uncertainties pinned.
    #[default]
    Levers,
}

impl SearchOver {
    /// Wire name of the search mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Levers => "levers",
        }
    }
}

/// Fixed parameters of the exploration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExplorationConfig {
    /// Problem formulation handed to the model provider.
    #[serde(default)]
    pub formulation: ProblemFormulation,

    /// Number of sampled scenarios in the experiment batch.
    #[serde(default = "default_scenarios")]
    pub scenarios: u32,

    /// Number of sampled policies in the experiment batch.
    #[serde(default = "default_policies")]
    pub policies: u32,

    /// Function-evaluation budget of the optimization.
    #[serde(default = "default_nfe")]
    pub nfe: u64,

    /// Inputs the optimizer searches over.
    #[serde(default)]
    pub search_over: SearchOver,
}

impl ExplorationConfig {
    /// Total number of runs the experiment batch executes.
    pub fn experiment_count(&self) -> u64 {
        u64::from(self.scenarios).saturating_mul(u64::from(self.policies))
    }

    /// Check that every count is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scenarios == 0 {
            return Err(invalid("exploration.scenarios must be positive"));
        }
        if self.policies == 0 {
            return Err(invalid("exploration.policies must be positive"));
        }
        if self.nfe == 0 {
            return Err(invalid("exploration.nfe must be positive"));
        }
        Ok(())
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            formulation: ProblemFormulation::default(),
            scenarios: default_scenarios(),
            policies: default_policies(),
            nfe: default_nfe(),
            search_over: SearchOver::default(),
        }
    }
}

/// Epsilon heuristic: a fixed fraction of each measure's observed range,
/// never below a floor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EpsilonConfig {
    /// Fraction of the observed range used as the tolerance.
    #[serde(default = "default_epsilon_fraction")]
    pub fraction: f64,

    /// Ranges below this are degenerate and get this value as tolerance.
    #[serde(default = "default_epsilon_floor")]
    pub floor: f64,
}

impl EpsilonConfig {
    /// Check that both parameters are finite and positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-finite or non-positive value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fraction.is_finite() && self.fraction > 0.0) {
            return Err(invalid("epsilon.fraction must be finite and positive"));
        }
        if !(self.floor.is_finite() && self.floor > 0.0) {
            return Err(invalid("epsilon.floor must be finite and positive"));
        }
        Ok(())
    }
}

impl Default for EpsilonConfig {
    fn default() -> Self {
        Self {
            fraction: default_epsilon_fraction(),
            floor: default_epsilon_floor(),
        }
    }
}

/// What to do with an uncertainty that is neither categorical nor bounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnrecognizedPolicy {
    /// Fail the build of the reference scenario.
    #[default]
    Reject,
    /// Leave the uncertainty out of the reference scenario and warn.
    Skip,
}

/// Reference scenario construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReferenceConfig {
    /// Name given to the built scenario.
    #[serde(default = "default_reference_name")]
    pub scenario_name: String,

    /// Handling of unrecognized uncertainty shapes.
    #[serde(default)]
    pub on_unrecognized: UnrecognizedPolicy,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            scenario_name: default_reference_name(),
            on_unrecognized: UnrecognizedPolicy::default(),
        }
    }
}

/// Connection settings for the external workbench service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Subject prefix the workbench service listens under.
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,

    /// Upper bound on a single workbench request, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl InfrastructureConfig {
    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("NATS_URL") {
            self.nats_url = val;
        }
    }
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            nats_url: default_nats_url(),
            subject_prefix: default_subject_prefix(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_owned(),
    }
}

const fn default_scenarios() -> u32 {
    50
}

const fn default_policies() -> u32 {
    4
}

const fn default_nfe() -> u64 {
    20
}

const fn default_epsilon_fraction() -> f64 {
    0.2
}

const fn default_epsilon_floor() -> f64 {
    1e-5
}

fn default_reference_name() -> String {
    "reference".to_owned()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_owned()
}

fn default_subject_prefix() -> String {
    "workbench".to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    3_600_000
}

fn default_log_level() -> String {
    "info".to_owned()
}
