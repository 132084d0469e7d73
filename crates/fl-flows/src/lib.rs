//! # fl-flows
//!
//! Bidirectional conversion between live estimator configurations and
//! portable flows: the forward pass walks a value graph and produces a
//! self-describing tree of flows, envelopes, and JSON-encoded parameters;
//! the inverse pass re-resolves identities through a component registry,
//! checks declared dependencies, and rebuilds an equivalent object graph.

pub mod deserialize;
pub mod envelope;
pub mod serialize;

pub use envelope::{component_reference, make_envelope, SERIALIZED_OBJECT_KEY, VALUE_KEY};
pub use serialize::FlowConverter;

use fl_model::default_registry;
use fl_types::{ComponentTable, FlResult, HpValue, Portable};

/// Convert a hyperparameter value to its portable form using the default
/// registry.
pub fn model_to_flow(value: &HpValue) -> FlResult<Portable> {
    FlowConverter::new(default_registry()).model_to_flow(value)
}

/// Reconstruct a hyperparameter value from its portable form using the
/// default registry. `components` is consumed destructively.
pub fn flow_to_model(
    value: &Portable,
    components: Option<&mut ComponentTable>,
) -> FlResult<HpValue> {
    FlowConverter::new(default_registry()).flow_to_model(value, components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_model::catalog::Standardize;

    #[test]
    fn free_functions_use_the_default_registry() {
        let portable = model_to_flow(&HpValue::estimator(Standardize::default())).unwrap();
        let rebuilt = flow_to_model(&portable, None).unwrap();
        assert_eq!(rebuilt, HpValue::estimator(Standardize::default()));
    }
}
