//! Capability interfaces of the estimator toolkit.
//!
//! The toolkit itself is opaque to FlowLog: a component only needs to expose
//! its fully-qualified identity and its shallow constructor parameters.
//! Producers implement these closed interfaces instead of being probed at
//! runtime.

use std::fmt;

use indexmap::IndexMap;

use crate::value::HpValue;

/// A configured model, transform, or meta-estimator.
pub trait Estimator: fmt::Debug + Send + Sync {
    /// Fully-qualified component path, e.g. `"mlcraft.linear.LogisticRegression"`.
    fn identity(&self) -> &str;

    /// Shallow (non-recursive) constructor parameters, in declaration order.
    fn params(&self) -> IndexMap<String, HpValue>;
}

/// A resampling/validation-split object, described by its constructor
/// parameter names rather than by a full parameter map.
pub trait CrossValidatorLike: fmt::Debug + Send + Sync {
    /// Fully-qualified component path.
    fn identity(&self) -> &str;

    /// Constructor parameter names (excluding any variadic catch-all).
    fn param_names(&self) -> Vec<String>;

    /// Current value of one constructor parameter, if set.
    fn attribute(&self, name: &str) -> Option<HpValue>;

    /// Parameter names excluded from serialization because they are
    /// deprecated aliases of other parameters.
    fn deprecated_params(&self) -> &'static [&'static str] {
        &[]
    }
}

/// The top-level package of a fully-qualified identity.
pub fn top_level_package(identity: &str) -> &str {
    identity.split('.').next().unwrap_or(identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_package_splits_identity() {
        assert_eq!(top_level_package("mlcraft.linear.LogisticRegression"), "mlcraft");
        assert_eq!(top_level_package("bare"), "bare");
    }
}
