//! Problem formulations of the dike-network model.
//!
//! A formulation bundles which outcomes, levers, and uncertainties the
//! model exposes. Providers select one by integer index in `0..=5`.

use serde::{Deserialize, Serialize};

/// Errors from selecting a problem formulation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulationError {
    /// The index is outside the known formulations.
    #[error("problem formulation {index} is out of range (expected 0-5)")]
    OutOfRange {
        /// The rejected index.
        index: u8,
    },
}

/// One of the six problem formulations a model provider knows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProblemFormulation {
    /// Two aggregated objectives.
    TwoObjective,
    /// Three aggregated objectives.
    ThreeObjective,
    /// Five aggregated objectives.
    FiveObjective,
    /// Objectives disaggregated over dike locations.
    #[default]
    PerLocation,
    /// Objectives disaggregated over planning steps.
    PerPlanningStep,
    /// Objectives disaggregated over locations and planning steps.
    FullyDisaggregated,
}

impl ProblemFormulation {
    /// The integer selector a model provider expects.
    pub const fn index(self) -> u8 {
        match self {
            Self::TwoObjective => 0,
            Self::ThreeObjective => 1,
            Self::FiveObjective => 2,
            Self::PerLocation => 3,
            Self::PerPlanningStep => 4,
            Self::FullyDisaggregated => 5,
        }
    }

    /// Human-readable label for log output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::TwoObjective => "2-objective",
            Self::ThreeObjective => "3-objective",
            Self::FiveObjective => "5-objective",
            Self::PerLocation => "disaggregated over locations",
            Self::PerPlanningStep => "disaggregated over time",
            Self::FullyDisaggregated => "disaggregated over locations and time",
        }
    }
}

impl TryFrom<u8> for ProblemFormulation {
    type Error = FormulationError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(Self::TwoObjective),
            1 => Ok(Self::ThreeObjective),
            2 => Ok(Self::FiveObjective),
            3 => Ok(Self::PerLocation),
            4 => Ok(Self::PerPlanningStep),
            5 => Ok(Self::FullyDisaggregated),
            _ => Err(FormulationError::OutOfRange { index }),
        }
    }
}

impl From<ProblemFormulation> for u8 {
    fn from(formulation: ProblemFormulation) -> Self {
        formulation.index()
    }
}

impl core::fmt::Display for ProblemFormulation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.index(), self.label())
    }
}
