//! Reference scenarios, epsilon derivation, and the exploration sequence.
//!
//! This crate drives one policy exploration of a dike-network model: it
//! pins the uncertainties to a reference scenario, runs an experiment
//! batch, turns the spread of the batch into per-objective epsilons, and
//! launches a many-objective search over the levers. The simulation, the
//! evaluator, and the optimizer are external and reached through the
//! traits in [`evaluator`].
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `riverguard.yaml` into
//!   strongly-typed structs.
//! - [`epsilon`] -- Per-outcome tolerance derivation.
//! - [`evaluator`] -- [`ModelProvider`], [`Evaluator`], [`EvaluatorFactory`],
//!   and the scoped evaluator guard.
//! - [`exploration`] -- The fixed run order.
//! - [`formulation`] -- Problem formulation selector.
//! - [`reference`] -- Reference scenario construction.
//! - [`stub`] -- Synthetic workbench for tests and dry runs.
//!
//! [`ModelProvider`]: evaluator::ModelProvider
//! [`Evaluator`]: evaluator::Evaluator
//! [`EvaluatorFactory`]: evaluator::EvaluatorFactory

pub mod config;
pub mod epsilon;
pub mod evaluator;
pub mod exploration;
pub mod formulation;
pub mod reference;
pub mod stub;
