//! Parameter values and parameter shapes.
//!
//! Uncertainties and levers share one shape vocabulary: a parameter is
//! either categorical (an ordered list of admissible values) or bounded
//! (a numeric interval). Model descriptions arrive from an external
//! provider, so any other `kind` tag deserializes to
//! [`ParameterShape::Unrecognized`] instead of failing the whole payload.

use serde::{Deserialize, Serialize};

/// A concrete value for a model input.
///
/// Serialized untagged so that bridge payloads carry plain JSON scalars.
/// Variant order matters for deserialization: whole numbers become
/// [`ParameterValue::Integer`], everything else numeric becomes
/// [`ParameterValue::Real`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// A boolean switch.
    Boolean(bool),
    /// A whole number.
    Integer(i64),
    /// A real number.
    Real(f64),
    /// A named category.
    Text(String),
}

impl core::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// The admissible value space of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShapeRepr", into = "ShapeRepr")]
pub enum ParameterShape {
    /// An ordered set of admissible category values.
    Categorical {
        /// Categories in declaration order.
        categories: Vec<ParameterValue>,
    },
    /// A closed numeric interval.
    Bounded {
        /// Lower bound of the interval.
        lower_bound: f64,
        /// Upper bound of the interval.
        upper_bound: f64,
    },
    /// Any shape this crate does not understand.
    Unrecognized {
        /// The `kind` tag it arrived with.
        kind: String,
    },
}

impl ParameterShape {
    /// Short label used in log fields and error messages.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Categorical { .. } => "categorical",
            Self::Bounded { .. } => "bounded",
            Self::Unrecognized { .. } => "unrecognized",
        }
    }
}

/// Wire form of [`ParameterShape`]: a known tagged shape, or any other
/// object that carries a `kind` tag.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ShapeRepr {
    Known(KnownShape),
    Other { kind: String },
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum KnownShape {
    Categorical {
        categories: Vec<ParameterValue>,
    },
    Bounded {
        lower_bound: f64,
        upper_bound: f64,
    },
}

impl TryFrom<ShapeRepr> for ParameterShape {
    type Error = String;

    fn try_from(repr: ShapeRepr) -> Result<Self, Self::Error> {
        match repr {
            ShapeRepr::Known(KnownShape::Categorical { categories }) => {
                Ok(Self::Categorical { categories })
            }
            ShapeRepr::Known(KnownShape::Bounded {
                lower_bound,
                upper_bound,
            }) => Ok(Self::Bounded {
                lower_bound,
                upper_bound,
            }),
            // A known tag that failed to parse as its shape is malformed.
            ShapeRepr::Other { kind } if kind == "categorical" || kind == "bounded" => {
                Err(format!("malformed {kind} parameter shape"))
            }
            ShapeRepr::Other { kind } => Ok(Self::Unrecognized { kind }),
        }
    }
}

impl From<ParameterShape> for ShapeRepr {
    fn from(shape: ParameterShape) -> Self {
        match shape {
            ParameterShape::Categorical { categories } => {
                Self::Known(KnownShape::Categorical { categories })
            }
            ParameterShape::Bounded {
                lower_bound,
                upper_bound,
            } => Self::Known(KnownShape::Bounded {
                lower_bound,
                upper_bound,
            }),
            ParameterShape::Unrecognized { kind } => Self::Other { kind },
        }
    }
}
