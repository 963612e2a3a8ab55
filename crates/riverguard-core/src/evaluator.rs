//! External collaborator traits and the scoped evaluator guard.
//!
//! Three things are supplied from outside this workspace: the model
//! provider that hands out a pre-built dike-network model, the evaluator
//! that runs experiment batches in parallel, and the many-objective
//! optimizer. [`ModelProvider`], [`Evaluator`], and [`EvaluatorFactory`]
//! are the seams; the runner binds them to a workbench service over NATS,
//! tests bind them to [`crate::stub`].
//!
//! An opened evaluator holds worker resources. [`with_evaluator`] opens
//! one, hands it to a closure, and shuts it down when the closure returns,
//! whether it succeeded or failed.

use riverguard_types::{
    ExperimentResults, LoadedModel, ModelDescription, OptimizationResult, Scenario,
};
use serde::Serialize;
use tracing::debug;

use crate::config::SearchOver;
use crate::epsilon::EpsilonVector;
use crate::formulation::ProblemFormulation;

/// Errors reported by an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EvaluatorError {
    /// The model provider could not produce the model.
    #[error("model provider error: {message}")]
    Provider {
        /// Description of the failure.
        message: String,
    },

    /// The evaluator could not be opened or failed during a call.
    #[error("evaluator error: {message}")]
    Evaluation {
        /// Description of the failure.
        message: String,
    },

    /// The optimizer failed or did not converge.
    #[error("optimizer error: {message}")]
    Optimization {
        /// Description of the failure.
        message: String,
    },

    /// The request could not be delivered or the reply could not be read.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The collaborator did not answer in time.
    #[error("request on {subject} timed out")]
    Timeout {
        /// The request subject that timed out.
        subject: String,
    },
}

/// Which scenarios an experiment batch runs under.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioSource {
    /// Sample this many scenarios from the uncertainty space.
    Sampled(u32),
    /// Run every policy under this one scenario.
    Fixed(Scenario),
}

/// Parameters of one experiment batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentRequest {
    /// Scenarios to run under.
    pub scenarios: ScenarioSource,
    /// Number of policies to sample.
    pub policies: u32,
}

impl ExperimentRequest {
    /// Number of runs the batch executes.
    pub fn run_count(&self) -> u64 {
        let scenarios = match &self.scenarios {
            ScenarioSource::Sampled(count) => u64::from(*count),
            ScenarioSource::Fixed(_) => 1,
        };
        scenarios.saturating_mul(u64::from(self.policies))
    }
}

/// Parameters of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationRequest {
    /// Function-evaluation budget.
    pub nfe: u64,
    /// Inputs to search over.
    pub search_over: SearchOver,
    /// One tolerance per outcome, in outcome order.
    pub epsilons: EpsilonVector,
    /// Scenario pinning the uncertainties during the search.
    pub reference: Scenario,
}

/// Source of pre-built simulation models.
pub trait ModelProvider {
    /// Load the model under the given problem formulation.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError`] if the model cannot be produced.
    fn load_model(&mut self, formulation: ProblemFormulation)
    -> Result<LoadedModel, EvaluatorError>;
}

/// An opened evaluator bound to one model.
pub trait Evaluator {
    /// Run an experiment batch and collect its outcomes.
    ///
    /// Every outcome measure in the result holds one value per executed run,
    /// in the same run order across measures.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError`] if any run fails.
    fn perform_experiments(
        &mut self,
        model: &ModelDescription,
        request: &ExperimentRequest,
    ) -> Result<ExperimentResults, EvaluatorError>;

    /// Run a many-objective search.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError`] if the search fails.
    fn optimize(
        &mut self,
        model: &ModelDescription,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResult, EvaluatorError>;

    /// Release worker resources. Called exactly once per opened evaluator.
    fn shutdown(&mut self);
}

/// Opens evaluators for a model.
pub trait EvaluatorFactory {
    /// The evaluator type this factory opens.
    type Evaluator: Evaluator;

    /// Open an evaluator with its workers ready.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluatorError`] if the workers cannot be started.
    fn open(&mut self, model: &ModelDescription) -> Result<Self::Evaluator, EvaluatorError>;
}

/// Guard that shuts its evaluator down when dropped.
#[derive(Debug)]
pub struct EvaluatorScope<E: Evaluator> {
    evaluator: E,
}

impl<E: Evaluator> EvaluatorScope<E> {
    /// Take ownership of an opened evaluator.
    pub const fn new(evaluator: E) -> Self {
        Self { evaluator }
    }

    /// The guarded evaluator.
    pub const fn evaluator(&mut self) -> &mut E {
        &mut self.evaluator
    }
}

impl<E: Evaluator> Drop for EvaluatorScope<E> {
    fn drop(&mut self) {
        debug!("Shutting down evaluator");
        self.evaluator.shutdown();
    }
}

/// Open an evaluator, run `f` with it, and shut it down afterwards.
///
/// # Errors
///
/// Returns the error from opening the evaluator or from `f`.
pub fn with_evaluator<F, T, R>(
    factory: &mut F,
    model: &ModelDescription,
    run: R,
) -> Result<T, EvaluatorError>
where
    F: EvaluatorFactory + ?Sized,
    R: FnOnce(&mut F::Evaluator) -> Result<T, EvaluatorError>,
{
    let mut scope = EvaluatorScope::new(factory.open(model)?);
    run(scope.evaluator())
}
