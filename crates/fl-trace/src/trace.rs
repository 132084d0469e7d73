//! Core trace types and selected-iteration lookup.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use fl_types::{FlResult, TraceError};

/// Key of one trace record: `(repeat, fold, iteration)`.
pub type TraceKey = (u32, u32, u32);

/// One record of a hyperparameter-search step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceIteration {
    /// Repeat number (0 when the search ran without repeats).
    pub repeat: u32,
    /// Fold number (0 when the search ran without folds).
    pub fold: u32,
    /// Iteration number of the search procedure.
    pub iteration: u32,
    /// Opaque parameter blob: a JSON object mapping `parameter_<name>` to a
    /// JSON-encoded value string.
    pub setup_string: Option<String>,
    /// Score awarded to this iteration.
    pub evaluation: f64,
    /// Whether this iteration was chosen as the best of its repeat/fold.
    pub selected: bool,
}

impl TraceIteration {
    pub fn new(
        repeat: u32,
        fold: u32,
        iteration: u32,
        setup_string: Option<String>,
        evaluation: f64,
        selected: bool,
    ) -> Self {
        Self {
            repeat,
            fold,
            iteration,
            setup_string,
            evaluation,
            selected,
        }
    }

    /// The parameters encoded in the setup string, with the `parameter_`
    /// prefix stripped and each value JSON-decoded.
    pub fn parameters(&self) -> FlResult<IndexMap<String, Value>> {
        const PREFIX: &str = "parameter_";

        let mut out = IndexMap::new();
        let Some(setup) = &self.setup_string else {
            return Ok(out);
        };
        let raw: IndexMap<String, String> = serde_json::from_str(setup)
            .map_err(|e| TraceError::InvalidSetup(e.to_string()))?;
        for (key, encoded) in raw {
            let name = key.strip_prefix(PREFIX).unwrap_or(&key).to_string();
            let value: Value = serde_json::from_str(&encoded)
                .map_err(|e| TraceError::InvalidSetup(e.to_string()))?;
            out.insert(name, value);
        }
        Ok(out)
    }
}

impl fmt::Display for TraceIteration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[({},{},{}): {} ({})]",
            self.repeat, self.fold, self.iteration, self.evaluation, self.selected
        )
    }
}

/// A parsed optimization trace: run id plus one record per
/// `(repeat, fold, iteration)` triple, in stable insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTrace {
    pub run_id: Option<u64>,
    pub iterations: IndexMap<TraceKey, TraceIteration>,
}

impl RunTrace {
    pub fn new(run_id: Option<u64>, iterations: IndexMap<TraceKey, TraceIteration>) -> Self {
        Self { run_id, iterations }
    }

    /// The iteration number marked as selected for the given fold and
    /// repeat. If several are marked (which should not happen) the first one
    /// wins; none at all is a failure.
    pub fn get_selected_iteration(&self, fold: u32, repeat: u32) -> FlResult<u32> {
        for ((r, f, i), iteration) in &self.iterations {
            if *r == repeat && *f == fold && iteration.selected {
                return Ok(*i);
            }
        }
        Err(TraceError::NoSelectedIteration { repeat, fold }.into())
    }
}

impl fmt::Display for RunTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.run_id {
            Some(run_id) => write!(
                f,
                "[Run id: {}, {} trace iterations]",
                run_id,
                self.iterations.len()
            ),
            None => write!(f, "[Run id: none, {} trace iterations]", self.iterations.len()),
        }
    }
}
