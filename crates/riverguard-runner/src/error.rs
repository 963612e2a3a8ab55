//! Error types for the runner binary.
//!
//! [`RunnerError`] wraps every failure mode between process start and the
//! final summary, so `main` can propagate with `?`.

use riverguard_core::config::ConfigError;
use riverguard_core::exploration::ExplorationError;

/// Top-level error for the runner binary.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Connecting to the workbench service failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },

    /// The exploration sequence failed.
    #[error("exploration error: {source}")]
    Exploration {
        /// The underlying exploration error.
        #[from]
        source: ExplorationError,
    },

    /// The blocking exploration task panicked or was cancelled.
    #[error("exploration task failed: {message}")]
    Task {
        /// Description of the join failure.
        message: String,
    },
}
