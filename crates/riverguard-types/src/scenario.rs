//! Named points in uncertainty space.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterValue;

/// A named assignment of one value per uncertainty.
///
/// Fields are private: once built, a scenario is only read. Experiment
/// runs and the optimization run that share a scenario therefore share the
/// exact same uncertainty assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    name: String,
    parameters: BTreeMap<String, ParameterValue>,
}

impl Scenario {
    /// Wrap a finished parameter mapping under a name.
    pub fn new(name: impl Into<String>, parameters: BTreeMap<String, ParameterValue>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// The scenario name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All assigned values keyed by uncertainty name.
    pub const fn parameters(&self) -> &BTreeMap<String, ParameterValue> {
        &self.parameters
    }

    /// The value assigned to one uncertainty.
    pub fn get(&self, uncertainty: &str) -> Option<&ParameterValue> {
        self.parameters.get(uncertainty)
    }

    /// Number of assigned uncertainties.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Whether no uncertainty is assigned.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
