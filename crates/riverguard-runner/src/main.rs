//! Runner binary for riverguard.
//!
//! Runs one policy exploration of the dike-network model against a
//! workbench service reachable over NATS, then logs a summary. There are no
//! command-line flags; everything comes from `riverguard.yaml` and the
//! environment.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `riverguard.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Connect to the workbench service over NATS
//! 4. Run the exploration sequence on a blocking thread
//! 5. Log the result

mod error;
mod workbench;

use std::path::Path;

use riverguard_core::config::RiverguardConfig;
use riverguard_core::exploration::{self, ExplorationReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::RunnerError;
use crate::workbench::NatsWorkbench;

const CONFIG_PATH: &str = "riverguard.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the NATS connection, or any step of
/// the exploration fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("riverguard-runner starting");
    info!(
        from_file,
        formulation = %config.exploration.formulation,
        scenarios = config.exploration.scenarios,
        policies = config.exploration.policies,
        experiments = config.exploration.experiment_count(),
        nfe = config.exploration.nfe,
        epsilon_fraction = config.epsilon.fraction,
        epsilon_floor = config.epsilon.floor,
        "Configuration loaded"
    );

    // 3. Connect to the workbench.
    info!(
        nats_url = config.infrastructure.nats_url,
        subject_prefix = config.infrastructure.subject_prefix,
        "Connecting to workbench"
    );
    let mut workbench = NatsWorkbench::connect(&config.infrastructure)
        .await
        .map_err(|e| RunnerError::Nats {
            message: format!("{e}"),
        })?;
    info!("Workbench connected");

    // 4. Run the exploration. The collaborator traits block on the runtime
    //    handle, so the sequence must not run on a runtime worker.
    let report = tokio::task::spawn_blocking(move || {
        exploration::run_exploration(&config, &mut workbench)
    })
    .await
    .map_err(|e| RunnerError::Task {
        message: format!("{e}"),
    })?
    .map_err(RunnerError::from)?;

    // 5. Log results.
    log_report(&report);

    info!("riverguard-runner shutdown complete");
    Ok(())
}

/// Load `riverguard.yaml` from the working directory.
///
/// Returns the config and whether it came from the file.
fn load_config() -> Result<(RiverguardConfig, bool), RunnerError> {
    let config_path = Path::new(CONFIG_PATH);
    if config_path.exists() {
        Ok((RiverguardConfig::from_file(config_path)?, true))
    } else {
        let mut config = RiverguardConfig::default();
        config.infrastructure.apply_env_overrides();
        Ok((config, false))
    }
}

fn log_report(report: &ExplorationReport) {
    let elapsed_ms = report
        .finished_at
        .signed_duration_since(report.started_at)
        .num_milliseconds();

    info!(
        run_id = %report.run_id,
        formulation = %report.formulation,
        planning_steps = report.planning_steps,
        experiments = report.experiment_count,
        epsilons = ?report.epsilons.as_slice(),
        solutions = report.optimization.results.len(),
        elapsed_ms,
        "Exploration complete"
    );
    for (name, value) in report.reference.parameters() {
        info!(uncertainty = name, value = %value, "Reference value");
    }
}
