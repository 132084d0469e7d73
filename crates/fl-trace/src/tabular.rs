//! Trace <-> tabular document conversion.
//!
//! The tabular document is the parsed form of the six-column trace table;
//! the byte-level reader/writer for the surrounding file format lives in
//! [`crate::files`].

use std::collections::HashMap;

use indexmap::IndexMap;

use fl_types::{FlResult, TraceError};

use crate::trace::{RunTrace, TraceIteration};

/// Relation name of the trace table.
pub const TRACE_RELATION: &str = "Trace";

/// Columns every trace table must declare.
pub const REQUIRED_ATTRIBUTES: [&str; 5] = ["repeat", "fold", "iteration", "evaluation", "selected"];

/// Optional opaque parameter column.
pub const SETUP_STRING_ATTRIBUTE: &str = "setup_string";

/// Declared type of one tabular column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Numeric,
    /// Enumerated values, e.g. `{true,false}`.
    Nominal(Vec<String>),
    Text,
}

/// One column declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularAttribute {
    pub name: String,
    pub column_type: ColumnType,
}

impl TabularAttribute {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// One data value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

/// A parsed row-oriented table: relation name, column declarations, rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDocument {
    pub relation: String,
    pub attributes: Vec<TabularAttribute>,
    pub rows: Vec<Vec<Cell>>,
}

/// How duplicate `(repeat, fold, iteration)` keys are handled while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Later rows silently replace earlier ones.
    #[default]
    Overwrite,
    /// A duplicate key fails the parse.
    Fail,
}

impl RunTrace {
    /// Parse a trace from a tabular document. The run id is unknown at this
    /// level and left unset.
    pub fn from_tabular(document: &TabularDocument, policy: DuplicatePolicy) -> FlResult<Self> {
        let index: HashMap<&str, usize> = document
            .attributes
            .iter()
            .enumerate()
            .map(|(position, attribute)| (attribute.name.as_str(), position))
            .collect();
        for required in REQUIRED_ATTRIBUTES {
            if !index.contains_key(required) {
                return Err(TraceError::MissingAttribute(required.to_string()).into());
            }
        }
        let setup_index = index.get(SETUP_STRING_ATTRIBUTE).copied();

        let mut iterations = IndexMap::new();
        for row in &document.rows {
            let repeat = coordinate_cell(row, index["repeat"], "repeat")?;
            let fold = coordinate_cell(row, index["fold"], "fold")?;
            let iteration = coordinate_cell(row, index["iteration"], "iteration")?;
            let evaluation = number_cell(row, index["evaluation"], "evaluation")?;
            let selected = selected_cell(row, index["selected"])?;
            let setup_string = match setup_index {
                None => None,
                Some(position) => text_cell(row, position)?,
            };

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

        Ok(Self::new(None, iterations))
    }

    /// Render the trace as the fixed six-column table, rows in iteration-map
    /// order. An unset setup string becomes empty text.
    pub fn to_tabular(&self) -> TabularDocument {
        let attributes = vec![
            TabularAttribute::new("repeat", ColumnType::Numeric),
            TabularAttribute::new("fold", ColumnType::Numeric),
            TabularAttribute::new("iteration", ColumnType::Numeric),
            TabularAttribute::new("evaluation", ColumnType::Numeric),
            TabularAttribute::new(
                "selected",
                ColumnType::Nominal(vec!["true".to_string(), "false".to_string()]),
            ),
            TabularAttribute::new(SETUP_STRING_ATTRIBUTE, ColumnType::Text),
        ];
        let rows = self
            .iterations
            .values()
            .map(|iteration| {
                vec![
                    Cell::Number(f64::from(iteration.repeat)),
                    Cell::Number(f64::from(iteration.fold)),
                    Cell::Number(f64::from(iteration.iteration)),
                    Cell::Number(iteration.evaluation),
                    Cell::Text(if iteration.selected { "true" } else { "false" }.to_string()),
                    Cell::Text(iteration.setup_string.clone().unwrap_or_default()),
                ]
            })
            .collect();

        TabularDocument {
            relation: TRACE_RELATION.to_string(),
            attributes,
            rows,
        }
    }
}

fn cell<'a>(row: &'a [Cell], position: usize, field: &str) -> Result<&'a Cell, TraceError> {
    row.get(position)
        .ok_or_else(|| TraceError::MissingField(field.to_string()))
}

fn render(cell: &Cell) -> String {
    match cell {
        Cell::Number(n) => n.to_string(),
        Cell::Text(s) => s.clone(),
    }
}

/// Coordinates are non-negative integers; numeric cells are truncated the
/// way the tabular parser delivers them.
fn coordinate_cell(row: &[Cell], position: usize, field: &str) -> FlResult<u32> {
    let cell = cell(row, position, field)?;
    let number = match cell {
        Cell::Number(n) => *n,
        Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| TraceError::InvalidField {
            field: field.to_string(),
            value: s.clone(),
        })?,
    };
    if !number.is_finite() || number < 0.0 || number.trunc() > f64::from(u32::MAX) {
        return Err(TraceError::InvalidField {
            field: field.to_string(),
            value: render(cell),
        }
        .into());
    }
    Ok(number.trunc() as u32)
}

fn number_cell(row: &[Cell], position: usize, field: &str) -> FlResult<f64> {
    let cell = cell(row, position, field)?;
    match cell {
        Cell::Number(n) => Ok(*n),
        Cell::Text(s) => s.trim().parse::<f64>().map_err(|_| {
            TraceError::InvalidField {
                field: field.to_string(),
                value: s.clone(),
            }
            .into()
        }),
    }
}

/// `selected` must be the literal token `true` or `false`.
fn selected_cell(row: &[Cell], position: usize) -> FlResult<bool> {
    let cell = cell(row, position, "selected")?;
    match cell {
        Cell::Text(s) if s == "true" => Ok(true),
        Cell::Text(s) if s == "false" => Ok(false),
        other => Err(TraceError::InvalidSelected(render(other)).into()),
    }
}

/// Empty text is the absent-setup convention.
fn text_cell(row: &[Cell], position: usize) -> FlResult<Option<String>> {
    let cell = cell(row, position, SETUP_STRING_ATTRIBUTE)?;
    Ok(match cell {
        Cell::Text(s) if s.is_empty() => None,
        Cell::Text(s) => Some(s.clone()),
        Cell::Number(n) => Some(n.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_types::FlError;

    fn sample_trace() -> RunTrace {
        let mut iterations = IndexMap::new();
        iterations.insert(
            (0, 0, 0),
            TraceIteration::new(0, 0, 0, None, 0.5, true),
        );
        iterations.insert(
            (0, 0, 1),
            TraceIteration::new(0, 0, 1, None, 0.7, false),
        );
        RunTrace::new(None, iterations)
    }

    fn row(repeat: f64, fold: f64, iteration: f64, evaluation: f64, selected: &str) -> Vec<Cell> {
        vec![
            Cell::Number(repeat),
            Cell::Number(fold),
            Cell::Number(iteration),
            Cell::Number(evaluation),
            Cell::Text(selected.to_string()),
            Cell::Text(String::new()),
        ]
    }

    #[test]
    fn tabular_round_trip() {
        let trace = sample_trace();
        let document = trace.to_tabular();

        assert_eq!(document.relation, TRACE_RELATION);
        assert_eq!(document.attributes.len(), 6);
        assert_eq!(
            document.attributes[4].column_type,
            ColumnType::Nominal(vec!["true".to_string(), "false".to_string()])
        );

        let parsed = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(parsed.iterations, trace.iterations);
    }

    #[test]
    fn setup_string_round_trips_through_empty_text() {
        let mut iterations = IndexMap::new();
        iterations.insert(
            (0, 0, 0),
            TraceIteration::new(
                0,
                0,
                0,
                Some("{\"parameter_c\": \"0.5\"}".to_string()),
                0.5,
                true,
            ),
        );
        iterations.insert((0, 0, 1), TraceIteration::new(0, 0, 1, None, 0.1, false));
        let trace = RunTrace::new(None, iterations);

        let parsed =
            RunTrace::from_tabular(&trace.to_tabular(), DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(
            parsed.iterations[&(0, 0, 0)].setup_string,
            Some("{\"parameter_c\": \"0.5\"}".to_string())
        );
        assert_eq!(parsed.iterations[&(0, 0, 1)].setup_string, None);
    }

    #[test]
    fn missing_required_attribute_fails() {
        let mut document = sample_trace().to_tabular();
        document.attributes.remove(4);
        for row in &mut document.rows {
            row.remove(4);
        }

        let result = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite);
        assert!(matches!(
            result,
            Err(FlError::Trace(TraceError::MissingAttribute(attribute))) if attribute == "selected"
        ));
    }

    #[test]
    fn setup_string_column_is_optional() {
        let mut document = sample_trace().to_tabular();
        document.attributes.pop();
        for row in &mut document.rows {
            row.pop();
        }

        let parsed = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(parsed.iterations[&(0, 0, 0)].setup_string, None);
    }

    #[test]
    fn invalid_selected_token_fails() {
        let mut document = sample_trace().to_tabular();
        document.rows[0][4] = Cell::Text("yes".to_string());

        let result = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite);
        assert!(matches!(
            result,
            Err(FlError::Trace(TraceError::InvalidSelected(token))) if token == "yes"
        ));
    }

    #[test]
    fn negative_coordinate_fails() {
        let mut document = sample_trace().to_tabular();
        document.rows[0][0] = Cell::Number(-1.0);

        let result = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite);
        assert!(matches!(
            result,
            Err(FlError::Trace(TraceError::InvalidField { field, .. })) if field == "repeat"
        ));
    }

    #[test]
    fn duplicate_keys_overwrite_by_default() {
        let document = TabularDocument {
            relation: TRACE_RELATION.to_string(),
            attributes: sample_trace().to_tabular().attributes,
            rows: vec![
                row(0.0, 0.0, 0.0, 0.5, "false"),
                row(0.0, 0.0, 0.0, 0.9, "true"),
            ],
        };

        let parsed = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(parsed.iterations.len(), 1);
        assert_eq!(parsed.iterations[&(0, 0, 0)].evaluation, 0.9);

        let strict = RunTrace::from_tabular(&document, DuplicatePolicy::Fail);
        assert!(matches!(
            strict,
            Err(FlError::Trace(TraceError::DuplicateIteration {
                repeat: 0,
                fold: 0,
                iteration: 0,
            }))
        ));
    }

    #[test]
    fn textual_numeric_cells_are_coerced() {
        let mut document = sample_trace().to_tabular();
        document.rows[0][0] = Cell::Text("2".to_string());
        document.rows[0][3] = Cell::Text("0.25".to_string());

        let parsed = RunTrace::from_tabular(&document, DuplicatePolicy::Overwrite).unwrap();
        assert_eq!(parsed.iterations[&(2, 0, 0)].evaluation, 0.25);
    }
}
