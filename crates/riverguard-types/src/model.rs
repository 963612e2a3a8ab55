//! Model description as exposed by a model provider.
//!
//! A [`ModelDescription`] is the declared interface of a pre-built
//! simulation model under one problem formulation: which uncertainties it
//! is exposed to, which levers a policy can pull, and which outcomes it
//! reports. The simulation itself lives behind the provider; only the
//! declarations travel.

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterShape;

/// An exogenous model input whose true value is unknown at design time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    /// Unique name within the model.
    pub name: String,
    /// Admissible value space.
    pub shape: ParameterShape,
}

impl Uncertainty {
    /// Create an uncertainty with the given name and shape.
    pub fn new(name: impl Into<String>, shape: ParameterShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// A policy-controllable model input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lever {
    /// Unique name within the model.
    pub name: String,
    /// Admissible value space.
    pub shape: ParameterShape,
}

/// Whether an outcome is an objective, and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeDirection {
    /// Smaller is better.
    Minimize,
    /// Larger is better.
    Maximize,
    /// Reported but not optimized.
    Info,
}

/// A declared model outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeDeclaration {
    /// Outcome name, matching the keys of experiment outcome batches.
    pub name: String,
    /// Optimization direction.
    pub direction: OutcomeDirection,
}

/// Declared interface of a model under one problem formulation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Model name as registered with the provider.
    pub name: String,
    /// Uncertainties in stable declaration order.
    #[serde(default)]
    pub uncertainties: Vec<Uncertainty>,
    /// Levers in stable declaration order.
    #[serde(default)]
    pub levers: Vec<Lever>,
    /// Outcomes in stable declaration order.
    #[serde(default)]
    pub outcomes: Vec<OutcomeDeclaration>,
}

impl ModelDescription {
    /// Iterate the names of the declared uncertainties.
    pub fn uncertainty_names(&self) -> impl Iterator<Item = &str> {
        self.uncertainties.iter().map(|u| u.name.as_str())
    }
}

/// A model handed out by a provider together with its planning horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModel {
    /// The model's declared interface.
    pub model: ModelDescription,
    /// Number of planning steps the dike-heightening policies span.
    pub planning_steps: u32,
}
