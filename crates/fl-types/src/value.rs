//! The hyperparameter value universe.
//!
//! `HpValue` is the closed, tagged model of everything a constructor
//! parameter can hold: JSON-like primitives and collections plus the special
//! object kinds (type symbols, frozen random variables, function references,
//! nested estimators, cross-validators).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::estimator::{CrossValidatorLike, Estimator};

/// Closed whitelist of numeric type symbols usable as parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    F32,
    F64,
    I32,
    I64,
    U32,
    U64,
}

impl ScalarType {
    /// Symbolic rendering used on the wire.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U32 => "u32",
            Self::U64 => "u64",
        }
    }

    /// Inverse of [`ScalarType::symbol`]; unknown symbols are not resolvable.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "f32" => Some(Self::F32),
            "f64" => Some(Self::F64),
            "i32" => Some(Self::I32),
            "i64" => Some(Self::I64),
            "u32" => Some(Self::U32),
            "u64" => Some(Self::U64),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A frozen random variable: a distribution identity plus its bounds and
/// the positional/keyword arguments it was created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenDistribution {
    pub identity: String,
    pub lower: f64,
    pub upper: f64,
    pub args: Vec<f64>,
    pub kwargs: IndexMap<String, f64>,
}

/// A reference to a named function, e.g. a scoring metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub identity: String,
}

impl FunctionRef {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }
}

/// A hyperparameter value.
#[derive(Clone)]
pub enum HpValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<HpValue>),
    Tuple(Vec<HpValue>),
    Map(IndexMap<String, HpValue>),
    Type(ScalarType),
    Distribution(FrozenDistribution),
    Function(FunctionRef),
    Estimator(Arc<dyn Estimator>),
    CrossValidator(Arc<dyn CrossValidatorLike>),
}

impl HpValue {
    /// Short kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Map(_) => "map",
            Self::Type(_) => "type",
            Self::Distribution(_) => "distribution",
            Self::Function(_) => "function",
            Self::Estimator(_) => "estimator",
            Self::CrossValidator(_) => "cross-validator",
        }
    }

    /// Whether this is a sized value of length zero (stored as an absent
    /// marker instead of an encoded empty collection).
    pub fn is_empty_sized(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::List(items) | Self::Tuple(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    pub fn estimator(value: impl Estimator + 'static) -> Self {
        Self::Estimator(Arc::new(value))
    }

    pub fn cross_validator(value: impl CrossValidatorLike + 'static) -> Self {
        Self::CrossValidator(Arc::new(value))
    }
}

impl From<bool> for HpValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for HpValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for HpValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for HpValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for HpValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<ScalarType> for HpValue {
    fn from(value: ScalarType) -> Self {
        Self::Type(value)
    }
}

impl fmt::Debug for HpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Self::List(v) => f.debug_tuple("List").field(v).finish(),
            Self::Tuple(v) => f.debug_tuple("Tuple").field(v).finish(),
            Self::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Self::Type(v) => f.debug_tuple("Type").field(v).finish(),
            Self::Distribution(v) => f.debug_tuple("Distribution").field(v).finish(),
            Self::Function(v) => f.debug_tuple("Function").field(v).finish(),
            Self::Estimator(v) => f.debug_tuple("Estimator").field(&v.identity()).finish(),
            Self::CrossValidator(v) => {
                f.debug_tuple("CrossValidator").field(&v.identity()).finish()
            }
        }
    }
}

impl PartialEq for HpValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Distribution(a), Self::Distribution(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            // Configured components compare structurally: same identity,
            // same parameters.
            (Self::Estimator(a), Self::Estimator(b)) => {
                a.identity() == b.identity() && a.params() == b.params()
            }
            (Self::CrossValidator(a), Self::CrossValidator(b)) => {
                if a.identity() != b.identity() || a.param_names() != b.param_names() {
                    return false;
                }
                a.param_names()
                    .iter()
                    .all(|name| a.attribute(name) == b.attribute(name))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_symbols_round_trip() {
        for ty in [
            ScalarType::F32,
            ScalarType::F64,
            ScalarType::I32,
            ScalarType::I64,
            ScalarType::U32,
            ScalarType::U64,
        ] {
            assert_eq!(ScalarType::from_symbol(ty.symbol()), Some(ty));
        }
        assert_eq!(ScalarType::from_symbol("complex128"), None);
    }

    #[test]
    fn empty_sized_detection() {
        assert!(HpValue::str("").is_empty_sized());
        assert!(HpValue::List(vec![]).is_empty_sized());
        assert!(HpValue::Tuple(vec![]).is_empty_sized());
        assert!(HpValue::Map(IndexMap::new()).is_empty_sized());

        assert!(!HpValue::Null.is_empty_sized());
        assert!(!HpValue::Int(0).is_empty_sized());
        assert!(!HpValue::str("x").is_empty_sized());
        assert!(!HpValue::List(vec![HpValue::Null]).is_empty_sized());
    }

    #[test]
    fn cross_variant_values_are_unequal() {
        assert_ne!(HpValue::Int(1), HpValue::Float(1.0));
        assert_ne!(HpValue::Null, HpValue::Bool(false));
        assert_ne!(HpValue::List(vec![]), HpValue::Tuple(vec![]));
    }
}
