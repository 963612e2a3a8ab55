//! Experiment and optimization results returned by an evaluator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterValue;

/// All observed values of one outcome measure across an experiment batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSeries {
    /// Outcome measure name.
    pub name: String,
    /// One value per executed experiment, in experiment order.
    pub values: Vec<f64>,
}

/// Outcome measures of an experiment batch, in the order the evaluator
/// produced them.
///
/// Behaves like an insertion-ordered map: inserting an existing name
/// replaces its values in place and keeps its position.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeBatch {
    series: Vec<OutcomeSeries>,
}

impl OutcomeBatch {
    /// Create an empty batch.
    pub const fn new() -> Self {
        Self { series: Vec::new() }
    }

    /// Insert or replace the values for a measure.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        if let Some(existing) = self.series.iter_mut().find(|s| s.name == name) {
            existing.values = values;
        } else {
            self.series.push(OutcomeSeries { name, values });
        }
    }

    /// Values of one measure.
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.values.as_slice())
    }

    /// Iterate measures in production order.
    pub fn iter(&self) -> impl Iterator<Item = &OutcomeSeries> {
        self.series.iter()
    }

    /// Iterate measure names in production order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|s| s.name.as_str())
    }

    /// Number of distinct measures.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether the batch holds no measures.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Vec<f64>)> for OutcomeBatch {
    fn from_iter<I: IntoIterator<Item = (N, Vec<f64>)>>(iter: I) -> Self {
        let mut batch = Self::new();
        for (name, values) in iter {
            batch.insert(name, values);
        }
        batch
    }
}

/// One executed simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    /// Name of the scenario the run sampled.
    pub scenario: String,
    /// Name of the policy the run applied.
    pub policy: String,
    /// Name of the model that was run.
    pub model: String,
}

/// Everything an experiment batch returns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExperimentResults {
    /// One record per executed run.
    pub experiments: Vec<ExperimentRecord>,
    /// Outcome values, one per executed run for every measure.
    pub outcomes: OutcomeBatch,
}

/// Progress of the optimizer at one point of its evaluation budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergencePoint {
    /// Function evaluations consumed so far.
    pub nfe: u64,
    /// Number of epsilon-box improvements so far.
    pub epsilon_progress: u64,
}

/// Everything a many-objective search returns.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// One row per solution on the final archive: lever values and outcome
    /// values keyed by name.
    pub results: Vec<BTreeMap<String, ParameterValue>>,
    /// Convergence record in evaluation order.
    pub convergence: Vec<ConvergencePoint>,
}
