//! Tagged JSON envelopes for values that cannot be represented as plain
//! JSON scalars or collections.

use serde_json::{json, Value};

/// Discriminator key marking a JSON object as a serialized special value.
pub const SERIALIZED_OBJECT_KEY: &str = "flowlog:serialized_object";

/// Payload key of a serialized special value.
pub const VALUE_KEY: &str = "value";

pub const DISC_TYPE: &str = "type";
pub const DISC_RV_FROZEN: &str = "rv_frozen";
pub const DISC_FUNCTION: &str = "function";
pub const DISC_COMPONENT_REFERENCE: &str = "component_reference";
pub const DISC_CV_OBJECT: &str = "cv_object";

/// Wrap a payload into a tagged envelope.
pub fn make_envelope(kind: &str, value: Value) -> Value {
    json!({
        SERIALIZED_OBJECT_KEY: kind,
        VALUE_KEY: value,
    })
}

/// An envelope pointing at a named component in the side-table. A present
/// `step_name` means the resolved component is wrapped as a
/// `(step_name, component)` pair.
pub fn component_reference(key: &str, step_name: Option<&str>) -> Value {
    make_envelope(
        DISC_COMPONENT_REFERENCE,
        json!({
            "key": key,
            "step_name": step_name,
        }),
    )
}

/// The discriminator of an envelope object, if it is one.
pub fn envelope_kind(object: &serde_json::Map<String, Value>) -> Option<&str> {
    object.get(SERIALIZED_OBJECT_KEY).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_reference_shape() {
        let reference = component_reference("scale", Some("scale"));
        assert_eq!(reference[SERIALIZED_OBJECT_KEY], DISC_COMPONENT_REFERENCE);
        assert_eq!(reference[VALUE_KEY]["key"], "scale");
        assert_eq!(reference[VALUE_KEY]["step_name"], "scale");

        let bare = component_reference("estimator", None);
        assert_eq!(bare[VALUE_KEY]["step_name"], Value::Null);
    }
}
