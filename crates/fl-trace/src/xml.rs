//! Trace <-> XML-shaped document conversion.
//!
//! The document is the parsed form of the XML wire format: nested maps with
//! namespaced field names and text-node values, as produced by an XML
//! reader. Byte-level XML parsing is out of scope here.

use indexmap::IndexMap;
use serde_json::{json, Value};

use fl_types::{FlResult, TraceError};

use crate::tabular::DuplicatePolicy;
use crate::trace::{RunTrace, TraceIteration};

pub const XML_TRACE: &str = "fl:trace";
pub const XML_RUN_ID: &str = "fl:run_id";
pub const XML_TRACE_ITERATION: &str = "fl:trace_iteration";
pub const XML_REPEAT: &str = "fl:repeat";
pub const XML_FOLD: &str = "fl:fold";
pub const XML_ITERATION: &str = "fl:iteration";
pub const XML_SETUP_STRING: &str = "fl:setup_string";
pub const XML_EVALUATION: &str = "fl:evaluation";
pub const XML_SELECTED: &str = "fl:selected";

impl RunTrace {
    /// Parse a trace from an XML-shaped document. A run id field is
    /// required; a single iteration element is coerced to a sequence.
    pub fn from_xml_value(document: &Value, policy: DuplicatePolicy) -> FlResult<Self> {
        let trace = document
            .get(XML_TRACE)
            .and_then(Value::as_object)
            .ok_or_else(|| TraceError::MissingField(XML_TRACE.to_string()))?;

        let run_id = parse_run_id(
            trace
                .get(XML_RUN_ID)
                .ok_or_else(|| TraceError::MissingField(XML_RUN_ID.to_string()))?,
        )?;

        let elements = match trace.get(XML_TRACE_ITERATION) {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(single @ Value::Object(_)) => vec![single],
            _ => return Err(TraceError::MissingIterations.into()),
        };

        let mut iterations = IndexMap::new();
        for element in elements {
            let repeat = integer_field(element, XML_REPEAT)?;
            let fold = integer_field(element, XML_FOLD)?;
            let iteration = integer_field(element, XML_ITERATION)?;
            let setup_string = setup_field(element)?;
            let evaluation = float_field(element, XML_EVALUATION)?;
            let selected = selected_field(element)?;

            let key = (repeat, fold, iteration);
            if iterations.contains_key(&key) && policy == DuplicatePolicy::Fail {
                return Err(TraceError::DuplicateIteration {
                    repeat,
                    fold,
                    iteration,
                }
                .into());
            }
            iterations.insert(
                key,
                TraceIteration::new(repeat, fold, iteration, setup_string, evaluation, selected),
            );
        }

        Ok(Self::new(run_id, iterations))
    }

    /// Render the trace in the XML document shape, field values as text.
    pub fn to_xml_value(&self) -> Value {
        let iterations: Vec<Value> = self
            .iterations
            .values()
            .map(|iteration| {
                json!({
                    XML_REPEAT: iteration.repeat.to_string(),
                    XML_FOLD: iteration.fold.to_string(),
                    XML_ITERATION: iteration.iteration.to_string(),
                    XML_SETUP_STRING: match &iteration.setup_string {
                        Some(setup) => Value::String(setup.clone()),
                        None => Value::Null,
                    },
                    XML_EVALUATION: iteration.evaluation.to_string(),
                    XML_SELECTED: if iteration.selected { "true" } else { "false" },
                })
            })
            .collect();

        json!({
            XML_TRACE: {
                XML_RUN_ID: match self.run_id {
                    Some(run_id) => Value::String(run_id.to_string()),
                    None => Value::Null,
                },
                XML_TRACE_ITERATION: iterations,
            }
        })
    }
}

fn parse_run_id(value: &Value) -> FlResult<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_u64().map(Some).ok_or_else(|| {
            TraceError::InvalidField {
                field: XML_RUN_ID.to_string(),
                value: n.to_string(),
            }
            .into()
        }),
        Value::String(s) => s.trim().parse::<u64>().map(Some).map_err(|_| {
            TraceError::InvalidField {
                field: XML_RUN_ID.to_string(),
                value: s.clone(),
            }
            .into()
        }),
        other => Err(TraceError::InvalidField {
            field: XML_RUN_ID.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

fn field<'a>(element: &'a Value, name: &str) -> Result<&'a Value, TraceError> {
    element
        .get(name)
        .ok_or_else(|| TraceError::MissingField(name.to_string()))
}

fn integer_field(element: &Value, name: &str) -> FlResult<u32> {
    let value = field(element, name)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        TraceError::InvalidField {
            field: name.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

fn float_field(element: &Value, name: &str) -> FlResult<f64> {
    let value = field(element, name)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        TraceError::InvalidField {
            field: name.to_string(),
            value: value.to_string(),
        }
        .into()
    })
}

fn selected_field(element: &Value) -> FlResult<bool> {
    let value = field(element, XML_SELECTED)?;
    match value.as_str() {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        _ => Err(TraceError::InvalidSelected(value.to_string()).into()),
    }
}

/// The setup string is JSON-decoded eagerly to validate it, but kept in its
/// raw encoded form.
fn setup_field(element: &Value) -> FlResult<Option<String>> {
    match field(element, XML_SETUP_STRING)? {
        Value::Null => Ok(None),
        Value::String(s) => {
            serde_json::from_str::<Value>(s)
                .map_err(|e| TraceError::InvalidSetup(e.to_string()))?;
            Ok(Some(s.clone()))
        }
        other => Err(TraceError::InvalidSetup(other.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_types::FlError;

    fn iteration_element(iteration: u32, evaluation: &str, selected: &str) -> Value {
        json!({
            XML_REPEAT: "0",
            XML_FOLD: "0",
            XML_ITERATION: iteration.to_string(),
            XML_SETUP_STRING: "{\"parameter_c\": \"0.5\"}",
            XML_EVALUATION: evaluation,
            XML_SELECTED: selected,
        })
    }

    #[test]
    fn xml_document_parses() {
        let document = json!({
            XML_TRACE: {
                XML_RUN_ID: "7",
                XML_TRACE_ITERATION: [
                    iteration_element(0, "0.5", "false"),
                    iteration_element(3, "0.9", "true"),
                ],
            }
        });

        let trace = RunTrace::from_xml_value(&document, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(trace.run_id, Some(7));
        assert_eq!(trace.iterations.len(), 2);
        assert_eq!(trace.get_selected_iteration(0, 0).unwrap(), 3);
        assert_eq!(
            trace.iterations[&(0, 0, 0)].setup_string.as_deref(),
            Some("{\"parameter_c\": \"0.5\"}")
        );
    }

    #[test]
    fn singleton_iteration_is_coerced_to_a_sequence() {
        let document = json!({
            XML_TRACE: {
                XML_RUN_ID: "7",
                XML_TRACE_ITERATION: iteration_element(0, "0.5", "true"),
            }
        });

        let trace = RunTrace::from_xml_value(&document, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(trace.iterations.len(), 1);
    }

    #[test]
    fn missing_run_id_or_iterations_fails() {
        let missing_id = json!({
            XML_TRACE: { XML_TRACE_ITERATION: [iteration_element(0, "0.5", "true")] }
        });
        assert!(matches!(
            RunTrace::from_xml_value(&missing_id, DuplicatePolicy::Overwrite),
            Err(FlError::Trace(TraceError::MissingField(field))) if field == XML_RUN_ID
        ));

        let missing_iterations = json!({ XML_TRACE: { XML_RUN_ID: "7" } });
        assert!(matches!(
            RunTrace::from_xml_value(&missing_iterations, DuplicatePolicy::Overwrite),
            Err(FlError::Trace(TraceError::MissingIterations))
        ));
    }

    #[test]
    fn invalid_selected_token_fails() {
        let document = json!({
            XML_TRACE: {
                XML_RUN_ID: "7",
                XML_TRACE_ITERATION: [iteration_element(0, "0.5", "yes")],
            }
        });

        assert!(matches!(
            RunTrace::from_xml_value(&document, DuplicatePolicy::Overwrite),
            Err(FlError::Trace(TraceError::InvalidSelected(_)))
        ));
    }

    #[test]
    fn setup_string_is_validated_eagerly() {
        let mut element = iteration_element(0, "0.5", "true");
        element[XML_SETUP_STRING] = json!("{broken");
        let document = json!({
            XML_TRACE: { XML_RUN_ID: "7", XML_TRACE_ITERATION: [element] }
        });

        assert!(matches!(
            RunTrace::from_xml_value(&document, DuplicatePolicy::Overwrite),
            Err(FlError::Trace(TraceError::InvalidSetup(_)))
        ));
    }

    #[test]
    fn xml_round_trip() {
        let mut iterations = IndexMap::new();
        iterations.insert(
            (0, 0, 0),
            TraceIteration::new(0, 0, 0, None, 0.5, true),
        );
        iterations.insert(
            (1, 2, 3),
            TraceIteration::new(
                1,
                2,
                3,
                Some("{\"parameter_c\": \"1\"}".to_string()),
                0.25,
                false,
            ),
        );
        let trace = RunTrace::new(Some(42), iterations);

        let parsed =
            RunTrace::from_xml_value(&trace.to_xml_value(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(parsed, trace);
    }
}
