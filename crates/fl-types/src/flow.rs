//! The portable, named description of a configured component.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default free-text description attached to generated flows.
pub const DEFAULT_FLOW_DESCRIPTION: &str = "Automatically created flow.";

/// Default language tag attached to generated flows.
pub const DEFAULT_FLOW_LANGUAGE: &str = "English";

/// Per-parameter metadata (description and declared data type). Both fields
/// are currently always empty but are part of the registry schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterMetaInfo {
    pub description: Option<String>,
    pub data_type: Option<String>,
}

/// A named, versioned description of a configured component.
///
/// The name combines the class identity with the names of all nested
/// components; parameters are JSON-encoded strings (`None` marks an absent
/// value); `components` holds nested flows keyed by a locally-unique name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub class_identity: String,
    pub description: String,
    pub parameters: IndexMap<String, Option<String>>,
    pub parameters_meta_info: IndexMap<String, ParameterMetaInfo>,
    pub components: IndexMap<String, Flow>,
    /// Sorted, de-duplicated, comma-joined `package==version` set covering
    /// this flow and all nested components.
    pub external_version: String,
    pub tags: Vec<String>,
    pub language: String,
    /// Newline-joined dependency constraints checked before reconstruction.
    pub dependencies: String,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
