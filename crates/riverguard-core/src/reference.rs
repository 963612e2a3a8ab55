//! Reference scenario construction.
//!
//! The reference scenario pins every uncertainty to one representative
//! value so that the experiment batch and the optimization see the same
//! point in uncertainty space:
//!
//! - categorical uncertainties take their first declared category
//! - bounded uncertainties take the midpoint of their interval
//!
//! Uncertainties of any other shape are rejected by default. With
//! [`UnrecognizedPolicy::Skip`] they are left out with a warning, which
//! leaves the scenario without that key.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use riverguard_types::{ParameterShape, ParameterValue, Scenario, Uncertainty};
use tracing::{debug, warn};

use crate::config::{ReferenceConfig, UnrecognizedPolicy};

/// Errors that can occur while building a reference scenario.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// The uncertainty is neither categorical nor bounded.
    #[error("uncertainty '{name}' has shape '{kind}', expected categorical or bounded")]
    UnrecognizedUncertaintyVariant {
        /// Name of the offending uncertainty.
        name: String,
        /// The shape tag it was declared with.
        kind: String,
    },

    /// A categorical uncertainty declares no categories.
    #[error("categorical uncertainty '{name}' declares no categories")]
    EmptyCategories {
        /// Name of the offending uncertainty.
        name: String,
    },

    /// Two uncertainties share a name.
    #[error("uncertainty '{name}' is declared more than once")]
    DuplicateUncertainty {
        /// The repeated name.
        name: String,
    },
}

/// The representative value of a single uncertainty, if its shape has one.
///
/// Returns `None` for [`ParameterShape::Unrecognized`] and for a
/// categorical shape without categories.
pub fn reference_value(shape: &ParameterShape) -> Option<ParameterValue> {
    match shape {
        ParameterShape::Categorical { categories } => categories.first().cloned(),
        ParameterShape::Bounded {
            lower_bound,
            upper_bound,
        } => Some(ParameterValue::Real(midpoint(*lower_bound, *upper_bound))),
        ParameterShape::Unrecognized { .. } => None,
    }
}

fn midpoint(lower: f64, upper: f64) -> f64 {
    (lower + upper) / 2.0
}

/// Build the reference scenario for a model's declared uncertainties.
///
/// The result has exactly one entry per recognized uncertainty.
///
/// # Errors
///
/// Returns [`ReferenceError::UnrecognizedUncertaintyVariant`] for an
/// unrecognized shape under [`UnrecognizedPolicy::Reject`],
/// [`ReferenceError::EmptyCategories`] for a categorical uncertainty
/// without categories, and [`ReferenceError::DuplicateUncertainty`] when a
/// name repeats.
pub fn build_reference_scenario(
    uncertainties: &[Uncertainty],
    config: &ReferenceConfig,
) -> Result<Scenario, ReferenceError> {
    let mut parameters = BTreeMap::new();

    for uncertainty in uncertainties {
        let value = match &uncertainty.shape {
            ParameterShape::Unrecognized { kind } => match config.on_unrecognized {
                UnrecognizedPolicy::Reject => {
                    return Err(ReferenceError::UnrecognizedUncertaintyVariant {
                        name: uncertainty.name.clone(),
                        kind: kind.clone(),
                    });
                }
                UnrecognizedPolicy::Skip => {
                    warn!(
                        uncertainty = uncertainty.name,
                        kind = kind.as_str(),
                        "Skipping uncertainty of unrecognized shape, reference scenario will not define it"
                    );
                    continue;
                }
            },
            shape => reference_value(shape).ok_or_else(|| ReferenceError::EmptyCategories {
                name: uncertainty.name.clone(),
            })?,
        };

        debug!(
            uncertainty = uncertainty.name,
            shape = uncertainty.shape.label(),
            value = %value,
            "Pinned reference value"
        );

        match parameters.entry(uncertainty.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(_) => {
                return Err(ReferenceError::DuplicateUncertainty {
                    name: uncertainty.name.clone(),
                });
            }
        }
    }

    Ok(Scenario::new(config.scenario_name.clone(), parameters))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn categorical(name: &str, categories: &[&str]) -> Uncertainty {
        Uncertainty::new(
            name,
            ParameterShape::Categorical {
                categories: categories.iter().map(|&c| ParameterValue::from(c)).collect(),
            },
        )
    }

    fn bounded(name: &str, lower_bound: f64, upper_bound: f64) -> Uncertainty {
        Uncertainty::new(
            name,
            ParameterShape::Bounded {
                lower_bound,
                upper_bound,
            },
        )
    }

    fn unrecognized(name: &str, kind: &str) -> Uncertainty {
        Uncertainty::new(
            name,
            ParameterShape::Unrecognized {
                kind: kind.to_owned(),
            },
        )
    }

    #[test]
    fn categorical_takes_first_category() {
        let scenario = build_reference_scenario(
            &[categorical("A", &["low", "mid", "high"])],
            &ReferenceConfig::default(),
        )
        .unwrap();
        assert_eq!(scenario.get("A"), Some(&ParameterValue::from("low")));
    }

    #[test]
    fn bounded_takes_midpoint() {
        let scenario =
            build_reference_scenario(&[bounded("B", 0.0, 10.0)], &ReferenceConfig::default())
                .unwrap();
        assert_eq!(scenario.get("B"), Some(&ParameterValue::Real(5.0)));
    }

    #[test]
    fn numeric_categories_keep_their_type() {
        let discount_rate = Uncertainty::new(
            "discount rate 0",
            ParameterShape::Categorical {
                categories: vec![
                    ParameterValue::Real(1.5),
                    ParameterValue::Real(2.5),
                    ParameterValue::Real(3.5),
                ],
            },
        );
        let scenario =
            build_reference_scenario(&[discount_rate], &ReferenceConfig::default()).unwrap();
        assert_eq!(scenario.get("discount rate 0"), Some(&ParameterValue::Real(1.5)));
    }

    #[test]
    fn key_set_matches_declared_uncertainties() {
        let uncertainties = [
            bounded("A.1_Bmax", 30.0, 350.0),
            categorical("A.1_Brate", &["1.0", "1.5", "10"]),
            bounded("A.1_pfail", 0.0, 1.0),
        ];
        let scenario =
            build_reference_scenario(&uncertainties, &ReferenceConfig::default()).unwrap();
        let keys: Vec<&str> = scenario.parameters().keys().map(String::as_str).collect();
        assert_eq!(keys, ["A.1_Bmax", "A.1_Brate", "A.1_pfail"]);
        assert_eq!(scenario.get("A.1_Bmax"), Some(&ParameterValue::Real(190.0)));
        assert_eq!(scenario.name(), "reference");
    }

    #[test]
    fn unrecognized_shape_is_rejected_by_default() {
        let uncertainties = [
            bounded("A", 0.0, 1.0),
            unrecognized("mystery", "ordinal"),
        ];
        let result = build_reference_scenario(&uncertainties, &ReferenceConfig::default());
        assert_eq!(
            result,
            Err(ReferenceError::UnrecognizedUncertaintyVariant {
                name: "mystery".to_owned(),
                kind: "ordinal".to_owned(),
            })
        );
    }

    #[test]
    fn unrecognized_shape_is_omitted_under_skip() {
        let config = ReferenceConfig {
            on_unrecognized: UnrecognizedPolicy::Skip,
            ..ReferenceConfig::default()
        };
        let uncertainties = [
            unrecognized("mystery", "ordinal"),
            bounded("A", 0.0, 1.0),
        ];
        let scenario = build_reference_scenario(&uncertainties, &config).unwrap();
        assert_eq!(scenario.len(), 1);
        assert!(scenario.get("mystery").is_none());
        assert_eq!(scenario.get("A"), Some(&ParameterValue::Real(0.5)));
    }

    #[test]
    fn empty_categories_are_an_error() {
        let result =
            build_reference_scenario(&[categorical("A", &[])], &ReferenceConfig::default());
        assert_eq!(
            result,
            Err(ReferenceError::EmptyCategories {
                name: "A".to_owned()
            })
        );
    }

    #[test]
    fn duplicate_names_are_an_error() {
        let result = build_reference_scenario(
            &[bounded("A", 0.0, 1.0), categorical("A", &["x"])],
            &ReferenceConfig::default(),
        );
        assert_eq!(
            result,
            Err(ReferenceError::DuplicateUncertainty {
                name: "A".to_owned()
            })
        );
    }

    #[test]
    fn no_uncertainties_yield_an_empty_scenario() {
        let scenario = build_reference_scenario(&[], &ReferenceConfig::default()).unwrap();
        assert!(scenario.is_empty());
    }

    #[test]
    fn scenario_name_comes_from_config() {
        let config = ReferenceConfig {
            scenario_name: "baseline".to_owned(),
            ..ReferenceConfig::default()
        };
        let scenario = build_reference_scenario(&[], &config).unwrap();
        assert_eq!(scenario.name(), "baseline");
    }
}
