//! The exploration sequence.
//!
//! [`run_exploration`] performs the fixed run order once:
//!
//! 1. Load the model for the configured problem formulation
//! 2. List the declared uncertainties
//! 3. Build the reference scenario
//! 4. Run the experiment batch in a scoped evaluator
//! 5. Derive epsilons from the batch outcomes
//! 6. Run the optimization in a scoped evaluator, pinned to the reference
//!
//! Nothing is retried or checkpointed. The first error from any step ends
//! the run.

use chrono::{DateTime, Utc};
use riverguard_types::{ExperimentResults, OptimizationResult, RunId, Scenario};
use tracing::{info, info_span};

use crate::config::RiverguardConfig;
use crate::epsilon::{self, EpsilonError, EpsilonVector};
use crate::evaluator::{
    self, Evaluator, EvaluatorError, EvaluatorFactory, ExperimentRequest, ModelProvider,
    OptimizationRequest, ScenarioSource,
};
use crate::formulation::ProblemFormulation;
use crate::reference::{self, ReferenceError};

/// Errors that end an exploration run.
#[derive(Debug, thiserror::Error)]
pub enum ExplorationError {
    /// The reference scenario could not be built.
    #[error("reference scenario error: {source}")]
    Reference {
        /// The underlying reference error.
        #[from]
        source: ReferenceError,
    },

    /// Epsilons could not be derived.
    #[error("epsilon error: {source}")]
    Epsilon {
        /// The underlying epsilon error.
        #[from]
        source: EpsilonError,
    },

    /// An external collaborator failed.
    #[error("evaluator error: {source}")]
    Evaluator {
        /// The underlying evaluator error.
        #[from]
        source: EvaluatorError,
    },

    /// An outcome measure does not hold one value per executed run.
    #[error("outcome '{measure}' has {actual} values, expected {expected}")]
    ShapeMismatch {
        /// The measure name.
        measure: String,
        /// Runs requested.
        expected: u64,
        /// Values received.
        actual: usize,
    },
}

/// What one exploration run produced.
#[derive(Debug, Clone)]
pub struct ExplorationReport {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Formulation the model was loaded under.
    pub formulation: ProblemFormulation,
    /// Planning steps reported by the model provider.
    pub planning_steps: u32,
    /// The scenario that pinned the uncertainties.
    pub reference: Scenario,
    /// Number of experiments executed in the batch.
    pub experiment_count: usize,
    /// Tolerances handed to the optimizer.
    pub epsilons: EpsilonVector,
    /// Optimizer output.
    pub optimization: OptimizationResult,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

/// Run the exploration sequence against a workbench.
///
/// # Errors
///
/// Returns [`ExplorationError`] from the first step that fails.
pub fn run_exploration<W>(
    config: &RiverguardConfig,
    workbench: &mut W,
) -> Result<ExplorationReport, ExplorationError>
where
    W: ModelProvider + EvaluatorFactory + ?Sized,
{
    let run_id = RunId::new();
    let span = info_span!("exploration", run_id = %run_id);
    let _guard = span.enter();
    let started_at = Utc::now();
    let exploration = &config.exploration;

    info!(
        formulation = %exploration.formulation,
        "Loading model"
    );
    let loaded = workbench.load_model(exploration.formulation)?;
    let model = &loaded.model;
    info!(
        model = model.name,
        planning_steps = loaded.planning_steps,
        uncertainties = model.uncertainties.len(),
        levers = model.levers.len(),
        outcomes = model.outcomes.len(),
        "Model loaded"
    );
    for uncertainty in &model.uncertainties {
        info!(
            uncertainty = uncertainty.name,
            shape = uncertainty.shape.label(),
            "Uncertainty defined in model"
        );
    }

    let reference = reference::build_reference_scenario(&model.uncertainties, &config.reference)?;
    info!(
        scenario = reference.name(),
        pinned = reference.len(),
        "Reference scenario created"
    );

    let request = ExperimentRequest {
        scenarios: ScenarioSource::Sampled(exploration.scenarios),
        policies: exploration.policies,
    };
    info!(
        scenarios = exploration.scenarios,
        policies = exploration.policies,
        "Performing experiments"
    );
    let results = evaluator::with_evaluator(workbench, model, |ev| {
        ev.perform_experiments(model, &request)
    })?;
    check_batch_shape(&results, request.run_count())?;
    info!(
        experiments = results.experiments.len(),
        measures = results.outcomes.len(),
        "Results loaded"
    );

    let epsilons = epsilon::derive_epsilons(&results.outcomes, &config.epsilon)?;
    info!(epsilons = ?epsilons.as_slice(), "Epsilons loaded");

    let optimization_request = OptimizationRequest {
        nfe: exploration.nfe,
        search_over: exploration.search_over,
        epsilons,
        reference,
    };
    info!(
        nfe = optimization_request.nfe,
        search_over = optimization_request.search_over.as_str(),
        "Starting optimization"
    );
    let optimization = evaluator::with_evaluator(workbench, model, |ev| {
        ev.optimize(model, &optimization_request)
    })?;
    info!(
        solutions = optimization.results.len(),
        convergence_points = optimization.convergence.len(),
        "Results optimized"
    );

    let OptimizationRequest {
        epsilons,
        reference,
        ..
    } = optimization_request;

    Ok(ExplorationReport {
        run_id,
        formulation: exploration.formulation,
        planning_steps: loaded.planning_steps,
        reference,
        experiment_count: results.experiments.len(),
        epsilons,
        optimization,
        started_at,
        finished_at: Utc::now(),
    })
}

/// Check that every measure holds exactly one value per requested run.
fn check_batch_shape(results: &ExperimentResults, expected: u64) -> Result<(), ExplorationError> {
    for series in results.outcomes.iter() {
        let matches = u64::try_from(series.values.len()).is_ok_and(|actual| actual == expected);
        if !matches {
            return Err(ExplorationError::ShapeMismatch {
                measure: series.name.clone(),
                expected,
                actual: series.values.len(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use riverguard_types::OutcomeBatch;

    use super::*;

    #[test]
    fn batch_shape_accepts_full_series() {
        let results = ExperimentResults {
            experiments: Vec::new(),
            outcomes: [("cost", vec![1.0, 2.0]), ("risk", vec![0.0, 0.0])]
                .into_iter()
                .collect(),
        };
        assert!(check_batch_shape(&results, 2).is_ok());
    }

    #[test]
    fn batch_shape_names_the_short_measure() {
        let mut outcomes = OutcomeBatch::new();
        outcomes.insert("cost", vec![1.0, 2.0]);
        outcomes.insert("risk", vec![0.0]);
        let results = ExperimentResults {
            experiments: Vec::new(),
            outcomes,
        };
        let err = check_batch_shape(&results, 2).unwrap_err();
        assert!(matches!(
            err,
            ExplorationError::ShapeMismatch { ref measure, expected: 2, actual: 1 } if measure == "risk"
        ));
    }

    #[test]
    fn empty_batch_has_no_shape_to_check() {
        let results = ExperimentResults::default();
        assert!(check_batch_shape(&results, 200).is_ok());
    }
}
