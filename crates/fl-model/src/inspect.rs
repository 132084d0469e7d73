//! Deep parameter inspection over nested estimator graphs.

use std::sync::Arc;

use indexmap::IndexMap;

use fl_types::{Estimator, FlResult, FlowError, HpValue};

/// Parameter holding the worker/core count of a component.
const WORKER_PARAMETER: &str = "n_workers";

/// Deep parameter map of a model: shallow parameters plus the parameters of
/// every nested estimator under `component__parameter` composite keys.
/// Named pipeline/ensemble steps contribute their step name as the scope.
pub fn flatten_params(model: &dyn Estimator) -> IndexMap<String, HpValue> {
    let mut flat = IndexMap::new();
    collect(model, None, &mut flat);
    flat
}

fn scoped(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        None => name.to_string(),
        Some(prefix) => format!("{prefix}__{name}"),
    }
}

fn collect(model: &dyn Estimator, prefix: Option<&str>, flat: &mut IndexMap<String, HpValue>) {
    for (name, value) in model.params() {
        let key = scoped(prefix, &name);
        match &value {
            HpValue::Estimator(nested) => {
                flat.insert(key.clone(), value.clone());
                collect(&**nested, Some(&key), flat);
            }
            HpValue::List(items) | HpValue::Tuple(items) => {
                flat.insert(key, value.clone());
                if let Some(steps) = steps_of(items) {
                    for (step_name, step) in steps {
                        if let Some(step) = step {
                            let step_key = scoped(prefix, step_name);
                            flat.insert(step_key.clone(), HpValue::Estimator(step.clone()));
                            collect(&**step, Some(&step_key), flat);
                        }
                    }
                }
            }
            _ => {
                flat.insert(key, value.clone());
            }
        }
    }
}

#[allow(clippy::type_complexity)]
fn steps_of(items: &[HpValue]) -> Option<Vec<(&str, Option<&Arc<dyn Estimator>>)>> {
    if items.is_empty() {
        return None;
    }
    let mut steps = Vec::with_capacity(items.len());
    for item in items {
        let pair = match item {
            HpValue::List(pair) | HpValue::Tuple(pair) if pair.len() == 2 => pair,
            _ => return None,
        };
        let name = match &pair[0] {
            HpValue::Str(name) => name.as_str(),
            _ => return None,
        };
        let step = match &pair[1] {
            HpValue::Estimator(est) => Some(est),
            HpValue::Null => None,
            _ => return None,
        };
        steps.push((name, step));
    }
    Some(steps)
}

fn last_segment(key: &str) -> &str {
    key.rsplit("__").next().unwrap_or(key)
}

/// Whether the model is configured to run on a single worker at every
/// nesting level. A search wrapper sweeping over the worker count is refused
/// outright, since no single setting describes such a run.
pub fn uses_single_worker(model: &dyn Estimator) -> FlResult<bool> {
    let flat = flatten_params(model);

    for (key, value) in &flat {
        if last_segment(key) != "param_distributions" {
            continue;
        }
        if let HpValue::Map(grid) = value {
            for grid_key in grid.keys() {
                if last_segment(grid_key) == WORKER_PARAMETER {
                    return Err(FlowError::WorkerSweep {
                        parameter: grid_key.clone(),
                    }
                    .into());
                }
            }
        }
    }

    Ok(flat.iter().all(|(key, value)| {
        last_segment(key) != WORKER_PARAMETER || matches!(value, HpValue::Int(1))
    }))
}
