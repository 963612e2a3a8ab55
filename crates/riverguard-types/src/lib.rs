//! Shared type definitions for riverguard.
//!
//! These are the values that cross the boundary between the exploration
//! driver and its external collaborators (model provider, experiment
//! evaluator, optimizer), so every type here is serde-serializable.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for runs and evaluator sessions
//! - [`parameter`] -- Parameter values and categorical/bounded shapes
//! - [`model`] -- Model descriptions: uncertainties, levers, outcomes
//! - [`scenario`] -- Immutable named scenarios
//! - [`results`] -- Experiment batches and optimization results

pub mod ids;
pub mod model;
pub mod parameter;
pub mod results;
pub mod scenario;

// Re-export all public types at crate root for convenience.
pub use ids::{RunId, SessionId};
pub use model::{Lever, LoadedModel, ModelDescription, OutcomeDeclaration, OutcomeDirection, Uncertainty};
pub use parameter::{ParameterShape, ParameterValue};
pub use results::{
    ConvergencePoint, ExperimentRecord, ExperimentResults, OptimizationResult, OutcomeBatch,
    OutcomeSeries,
};
pub use scenario::Scenario;
