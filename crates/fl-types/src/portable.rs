//! The converter's output tree.

use indexmap::IndexMap;
use serde_json::Value;

use crate::flow::Flow;

/// Side-table of named components consumed during reconstruction. Each entry
/// is removed as it is substituted into its target location.
pub type ComponentTable = IndexMap<String, Flow>;

/// A converted value: plain JSON (scalars, encoded envelopes), collections
/// that may still carry flows, or a flow itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Portable {
    Json(Value),
    List(Vec<Portable>),
    Tuple(Vec<Portable>),
    Map(IndexMap<String, Portable>),
    Flow(Box<Flow>),
}

impl Portable {
    pub fn as_flow(&self) -> Option<&Flow> {
        match self {
            Self::Flow(flow) => Some(flow),
            _ => None,
        }
    }

    /// Whether this is a sized value of length zero (stored as an absent
    /// marker rather than an encoded empty collection).
    pub fn is_empty_sized(&self) -> bool {
        match self {
            Self::Json(Value::String(s)) => s.is_empty(),
            Self::Json(Value::Array(items)) => items.is_empty(),
            Self::Json(Value::Object(map)) => map.is_empty(),
            Self::List(items) | Self::Tuple(items) => items.is_empty(),
            Self::Map(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl From<Value> for Portable {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Flow> for Portable {
    fn from(flow: Flow) -> Self {
        Self::Flow(Box::new(flow))
    }
}
