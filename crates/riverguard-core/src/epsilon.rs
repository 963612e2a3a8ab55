//! Epsilon derivation from an experiment batch.
//!
//! A many-objective optimizer needs a resolution per objective: two
//! solutions closer than epsilon on every objective count as equivalent.
//! The tolerance for each outcome measure is a fixed fraction of the range
//! the experiment batch actually observed, with a floor for measures that
//! barely moved, so no tolerance is ever zero.

use riverguard_types::OutcomeBatch;
use serde::Serialize;

use crate::config::EpsilonConfig;

/// Errors that can occur while deriving epsilons.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EpsilonError {
    /// A measure has no observations.
    #[error("outcome '{measure}' has no observations")]
    EmptyMeasure {
        /// The measure name.
        measure: String,
    },

    /// A measure contains NaN or an infinity.
    #[error("outcome '{measure}' contains a non-finite value at run {index}")]
    NonFinite {
        /// The measure name.
        measure: String,
        /// Position of the first offending value.
        index: usize,
    },

    /// The fraction or floor is unusable.
    #[error("invalid epsilon policy: fraction {fraction}, floor {floor}")]
    InvalidPolicy {
        /// Configured fraction.
        fraction: f64,
        /// Configured floor.
        floor: f64,
    },
}

/// One tolerance per outcome measure, in outcome batch order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct EpsilonVector(Vec<f64>);

impl EpsilonVector {
    /// Tolerances as a slice.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of tolerances.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tolerances.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Unwrap into the underlying vector.
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Observed `max - min` of a measure.
///
/// Returns `None` for an empty slice.
pub fn observed_range(values: &[f64]) -> Option<f64> {
    let (&first, rest) = values.split_first()?;
    let (min, max) = rest
        .iter()
        .fold((first, first), |(min, max), &v| (min.min(v), max.max(v)));
    Some(max - min)
}

/// Tolerance for a single observed range.
pub fn tolerance_for_range(range: f64, config: &EpsilonConfig) -> f64 {
    if range < config.floor {
        config.floor
    } else {
        range * config.fraction
    }
}

/// Derive one epsilon per outcome measure.
///
/// # Errors
///
/// Returns [`EpsilonError::InvalidPolicy`] if the config fails validation,
/// [`EpsilonError::EmptyMeasure`] for a measure without values, and
/// [`EpsilonError::NonFinite`] for a measure holding NaN or infinity.
pub fn derive_epsilons(
    outcomes: &OutcomeBatch,
    config: &EpsilonConfig,
) -> Result<EpsilonVector, EpsilonError> {
    if config.validate().is_err() {
        return Err(EpsilonError::InvalidPolicy {
            fraction: config.fraction,
            floor: config.floor,
        });
    }

    let mut epsilons = Vec::with_capacity(outcomes.len());
    for series in outcomes.iter() {
        if let Some(index) = series.values.iter().position(|v| !v.is_finite()) {
            return Err(EpsilonError::NonFinite {
                measure: series.name.clone(),
                index,
            });
        }
        let range = observed_range(&series.values).ok_or_else(|| EpsilonError::EmptyMeasure {
            measure: series.name.clone(),
        })?;
        let epsilon = tolerance_for_range(range, config);
        tracing::debug!(measure = series.name, range, epsilon, "Derived epsilon");
        epsilons.push(epsilon);
    }

    Ok(EpsilonVector(epsilons))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    fn batch(measures: &[(&str, &[f64])]) -> OutcomeBatch {
        measures
            .iter()
            .map(|&(name, values)| (name, values.to_vec()))
            .collect()
    }

    fn derive(measures: &[(&str, &[f64])]) -> Vec<f64> {
        derive_epsilons(&batch(measures), &EpsilonConfig::default())
            .unwrap()
            .into_inner()
    }

    #[test]
    fn constant_values_hit_the_floor() {
        assert_eq!(derive(&[("cost", &[10.0, 10.0, 10.0])]), [1e-5]);
    }

    #[test]
    fn spread_values_take_a_fifth_of_the_range() {
        assert_eq!(derive(&[("cost", &[0.0, 100.0])]), [20.0]);
    }

    #[test]
    fn order_follows_the_outcome_batch() {
        assert_eq!(
            derive(&[("cost", &[0.0, 10.0]), ("risk", &[5.0, 5.0])]),
            [2.0, 1e-5]
        );
        assert_eq!(
            derive(&[("risk", &[5.0, 5.0]), ("cost", &[0.0, 10.0])]),
            [1e-5, 2.0]
        );
    }

    #[test]
    fn single_observation_hits_the_floor() {
        assert_eq!(derive(&[("deaths", &[0.3])]), [1e-5]);
    }

    #[test]
    fn range_just_below_floor_is_degenerate() {
        assert_eq!(derive(&[("cost", &[1.0, 1.000_009])]), [1e-5]);
    }

    #[test]
    fn unordered_values_use_true_extremes() {
        assert_eq!(derive(&[("cost", &[7.0, -3.0, 2.0, 12.0, 0.0])]), [3.0]);
    }

    #[test]
    fn no_epsilon_is_ever_zero() {
        let epsilons = derive(&[
            ("a", &[0.0, 0.0]),
            ("b", &[1.0, 2.0]),
            ("c", &[-1e9, 1e9]),
        ]);
        assert_eq!(epsilons.len(), 3);
        assert!(epsilons.iter().all(|&e| e > 0.0));
    }

    #[test]
    fn empty_batch_gives_empty_vector() {
        assert!(derive(&[]).is_empty());
    }

    #[test]
    fn empty_measure_is_an_error() {
        let result = derive_epsilons(&batch(&[("cost", &[])]), &EpsilonConfig::default());
        assert_eq!(
            result,
            Err(EpsilonError::EmptyMeasure {
                measure: "cost".to_owned()
            })
        );
    }

    #[test]
    fn nan_is_an_error() {
        let result = derive_epsilons(
            &batch(&[("cost", &[1.0, f64::NAN])]),
            &EpsilonConfig::default(),
        );
        assert_eq!(
            result,
            Err(EpsilonError::NonFinite {
                measure: "cost".to_owned(),
                index: 1
            })
        );
    }

    #[test]
    fn custom_policy_is_applied() {
        let config = EpsilonConfig {
            fraction: 0.5,
            floor: 1.0,
        };
        let epsilons = derive_epsilons(
            &batch(&[("cost", &[0.0, 10.0]), ("risk", &[0.0, 0.5])]),
            &config,
        )
        .unwrap();
        assert_eq!(epsilons.as_slice(), [5.0, 1.0]);
    }

    #[test]
    fn zero_floor_is_rejected() {
        let config = EpsilonConfig {
            fraction: 0.2,
            floor: 0.0,
        };
        let result = derive_epsilons(&batch(&[("cost", &[0.0, 1.0])]), &config);
        assert!(matches!(result, Err(EpsilonError::InvalidPolicy { .. })));
    }

    #[test]
    fn observed_range_of_empty_slice_is_none() {
        assert_eq!(observed_range(&[]), None);
        assert_eq!(observed_range(&[4.0, 1.0]), Some(3.0));
    }
}
