//! In-process stand-ins for the external workbench.
//!
//! [`StubWorkbench`] declares a small dike-network model and answers
//! experiment and optimization requests with synthetic numbers, so the
//! exploration sequence can be exercised end-to-end without the real
//! simulation. It records every call it receives.
//!
//! Synthetic outcomes: for run `i` and the `k`-th declared outcome
//! (1-based), objectives report `i * k`; `info` outcomes report `0.0`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use riverguard_types::{
    ConvergencePoint, ExperimentRecord, ExperimentResults, Lever, LoadedModel, ModelDescription,
    OptimizationResult, OutcomeBatch, OutcomeDeclaration, OutcomeDirection, ParameterShape,
    ParameterValue, Uncertainty,
};

use crate::evaluator::{
    Evaluator, EvaluatorError, EvaluatorFactory, ExperimentRequest, ModelProvider,
    OptimizationRequest, ScenarioSource,
};
use crate::formulation::ProblemFormulation;
use crate::reference::reference_value;

/// Everything the stub has been asked to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StubCalls {
    /// Formulations requested from the provider.
    pub formulations: Vec<ProblemFormulation>,
    /// Evaluators successfully opened.
    pub opened: u32,
    /// Evaluators shut down.
    pub shutdowns: u32,
    /// Experiment requests received.
    pub experiments: Vec<ExperimentRequest>,
    /// Optimization requests received.
    pub optimizations: Vec<OptimizationRequest>,
}

/// A model provider and evaluator factory backed by synthetic data.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct StubWorkbench {
    loaded: LoadedModel,
    calls: Rc<RefCell<StubCalls>>,
    fail_open: bool,
    fail_experiments: bool,
    fail_optimization: bool,
    truncate_outcomes: bool,
}

impl StubWorkbench {
    /// A stub serving the given model.
    pub fn new(loaded: LoadedModel) -> Self {
        Self {
            loaded,
            calls: Rc::new(RefCell::new(StubCalls::default())),
            fail_open: false,
            fail_experiments: false,
            fail_optimization: false,
            truncate_outcomes: false,
        }
    }

    /// A stub serving a reduced dike-network model: one dike ring, the
    /// flood-wave and discount-rate uncertainties, and room-for-river,
    /// heightening, and early-warning levers.
    pub fn dike_network() -> Self {
        let bounded = |lower_bound, upper_bound| ParameterShape::Bounded {
            lower_bound,
            upper_bound,
        };
        let reals = |values: &[f64]| ParameterShape::Categorical {
            categories: values.iter().map(|&v| ParameterValue::Real(v)).collect(),
        };
        let objective = |name: &str| OutcomeDeclaration {
            name: name.to_owned(),
            direction: OutcomeDirection::Minimize,
        };

        let model = ModelDescription {
            name: "dikesnet".to_owned(),
            uncertainties: vec![
                Uncertainty::new("A.0_ID flood wave shape", bounded(0.0, 132.0)),
                Uncertainty::new("A.1_Bmax", bounded(30.0, 350.0)),
                Uncertainty::new("A.1_pfail", bounded(0.0, 1.0)),
                Uncertainty::new("A.1_Brate", reals(&[1.0, 1.5, 10.0])),
                Uncertainty::new("discount rate 0", reals(&[1.5, 2.5, 3.5, 4.5])),
            ],
            levers: vec![
                Lever {
                    name: "0_RfR 0".to_owned(),
                    shape: ParameterShape::Categorical {
                        categories: vec![ParameterValue::Integer(0), ParameterValue::Integer(1)],
                    },
                },
                Lever {
                    name: "A.1_DikeIncrease 0".to_owned(),
                    shape: bounded(0.0, 10.0),
                },
                Lever {
                    name: "EWS_DaysToThreat".to_owned(),
                    shape: bounded(0.0, 4.0),
                },
            ],
            outcomes: vec![
                objective("A.1 Total Costs"),
                objective("A.1_Expected Number of Deaths"),
                objective("RfR Total Costs"),
                OutcomeDeclaration {
                    name: "Expected Evacuation Costs".to_owned(),
                    direction: OutcomeDirection::Info,
                },
            ],
        };

        Self::new(LoadedModel {
            model,
            planning_steps: 3,
        })
    }

    /// Make every `open` fail.
    #[must_use]
    pub const fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Make every experiment batch fail after the evaluator opened.
    #[must_use]
    pub const fn failing_experiments(mut self) -> Self {
        self.fail_experiments = true;
        self
    }

    /// Make every optimization fail after the evaluator opened.
    #[must_use]
    pub const fn failing_optimization(mut self) -> Self {
        self.fail_optimization = true;
        self
    }

    /// Drop the last value of every outcome series, producing a batch whose
    /// shape does not match the request.
    #[must_use]
    pub const fn truncating_outcomes(mut self) -> Self {
        self.truncate_outcomes = true;
        self
    }

    /// The model this stub serves.
    pub const fn loaded(&self) -> &LoadedModel {
        &self.loaded
    }

    /// Snapshot of the calls received so far.
    pub fn calls(&self) -> StubCalls {
        self.calls.borrow().clone()
    }
}

impl ModelProvider for StubWorkbench {
    fn load_model(
        &mut self,
        formulation: ProblemFormulation,
    ) -> Result<LoadedModel, EvaluatorError> {
        self.calls.borrow_mut().formulations.push(formulation);
        Ok(self.loaded.clone())
    }
}

impl EvaluatorFactory for StubWorkbench {
    type Evaluator = StubEvaluator;

    fn open(&mut self, model: &ModelDescription) -> Result<StubEvaluator, EvaluatorError> {
        if self.fail_open {
            return Err(EvaluatorError::Evaluation {
                message: format!("no workers available for {}", model.name),
            });
        }
        let mut calls = self.calls.borrow_mut();
        calls.opened = calls.opened.saturating_add(1);
        drop(calls);
        Ok(StubEvaluator {
            calls: Rc::clone(&self.calls),
            fail_experiments: self.fail_experiments,
            fail_optimization: self.fail_optimization,
            truncate_outcomes: self.truncate_outcomes,
        })
    }
}

/// Evaluator handed out by [`StubWorkbench`].
#[derive(Debug)]
pub struct StubEvaluator {
    calls: Rc<RefCell<StubCalls>>,
    fail_experiments: bool,
    fail_optimization: bool,
    truncate_outcomes: bool,
}

impl Evaluator for StubEvaluator {
    fn perform_experiments(
        &mut self,
        model: &ModelDescription,
        request: &ExperimentRequest,
    ) -> Result<ExperimentResults, EvaluatorError> {
        self.calls.borrow_mut().experiments.push(request.clone());
        if self.fail_experiments {
            return Err(EvaluatorError::Evaluation {
                message: format!("worker crashed while running {}", model.name),
            });
        }

        let scenario_names: Vec<String> = match &request.scenarios {
            ScenarioSource::Sampled(count) => (0..*count).map(|s| s.to_string()).collect(),
            ScenarioSource::Fixed(scenario) => vec![scenario.name().to_owned()],
        };

        let mut experiments = Vec::new();
        for scenario in &scenario_names {
            for policy in 0..request.policies {
                experiments.push(ExperimentRecord {
                    scenario: scenario.clone(),
                    policy: format!("policy {policy}"),
                    model: model.name.clone(),
                });
            }
        }

        let runs = u32::try_from(experiments.len()).map_err(|e| EvaluatorError::Evaluation {
            message: format!("batch of {} runs is too large: {e}", experiments.len()),
        })?;
        let kept_runs = if self.truncate_outcomes {
            runs.saturating_sub(1)
        } else {
            runs
        };

        let mut outcomes = OutcomeBatch::new();
        for (outcome, weight) in model.outcomes.iter().zip(1_u32..) {
            let values = (0..kept_runs)
                .map(|run| match outcome.direction {
                    OutcomeDirection::Info => 0.0,
                    OutcomeDirection::Minimize | OutcomeDirection::Maximize => {
                        f64::from(run) * f64::from(weight)
                    }
                })
                .collect();
            outcomes.insert(outcome.name.clone(), values);
        }

        Ok(ExperimentResults {
            experiments,
            outcomes,
        })
    }

    fn optimize(
        &mut self,
        model: &ModelDescription,
        request: &OptimizationRequest,
    ) -> Result<OptimizationResult, EvaluatorError> {
        self.calls.borrow_mut().optimizations.push(request.clone());
        if self.fail_optimization {
            return Err(EvaluatorError::Optimization {
                message: format!("no convergence after {} evaluations", request.nfe),
            });
        }

        let mut row = BTreeMap::new();
        for lever in &model.levers {
            if let Some(value) = reference_value(&lever.shape) {
                row.insert(lever.name.clone(), value);
            }
        }
        for outcome in &model.outcomes {
            row.insert(outcome.name.clone(), ParameterValue::Real(0.0));
        }

        Ok(OptimizationResult {
            results: vec![row],
            convergence: vec![
                ConvergencePoint {
                    nfe: 0,
                    epsilon_progress: 0,
                },
                ConvergencePoint {
                    nfe: request.nfe,
                    epsilon_progress: 1,
                },
            ],
        })
    }

    fn shutdown(&mut self) {
        let mut calls = self.calls.borrow_mut();
        calls.shutdowns = calls.shutdowns.saturating_add(1);
    }
}
