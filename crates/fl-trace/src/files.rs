//! Filesystem round-trip for the tabular trace format.
//!
//! The file carries the column declarations as `@RELATION`/`@ATTRIBUTE`
//! header lines followed by a `@DATA` section of comma-separated rows with
//! single-quote quoting.

use std::fs;
use std::path::Path;

use tracing::info;

use fl_types::{FlResult, TraceError};

use crate::tabular::{Cell, ColumnType, DuplicatePolicy, TabularAttribute, TabularDocument};
use crate::trace::RunTrace;

/// File name used when writing a trace into a directory.
pub const TRACE_FILE_NAME: &str = "trace.arff";

impl RunTrace {
    /// Read a trace from a tabular trace file.
    pub fn from_filesystem(path: impl AsRef<Path>) -> FlResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(TraceError::FileNotFound(path.display().to_string()).into());
        }
        let text = fs::read_to_string(path).map_err(TraceError::Io)?;
        let document = parse_document(&text)?;
        info!(
            "Loaded {} trace rows from {}",
            document.rows.len(),
            path.display()
        );
        Self::from_tabular(&document, DuplicatePolicy::Overwrite)
    }

    /// Write the trace as [`TRACE_FILE_NAME`] inside `directory`.
    pub fn to_filesystem(&self, directory: impl AsRef<Path>) -> FlResult<()> {
        let document = self.to_tabular();
        let text = write_document(&document)?;
        let path = directory.as_ref().join(TRACE_FILE_NAME);
        fs::write(&path, text).map_err(TraceError::Io)?;
        info!(
            "Wrote {} trace rows to {}",
            document.rows.len(),
            path.display()
        );
        Ok(())
    }
}

fn render_column_type(column_type: &ColumnType) -> String {
    match column_type {
        ColumnType::Numeric => "NUMERIC".to_string(),
        ColumnType::Nominal(values) => format!("{{{}}}", values.join(",")),
        ColumnType::Text => "STRING".to_string(),
    }
}

fn parse_column_type(text: &str) -> FlResult<ColumnType> {
    if let Some(inner) = text.strip_prefix('{').and_then(|t| t.strip_suffix('}')) {
        let values = inner.split(',').map(|v| v.trim().to_string()).collect();
        return Ok(ColumnType::Nominal(values));
    }
    match text.to_ascii_uppercase().as_str() {
        "NUMERIC" | "REAL" | "INTEGER" => Ok(ColumnType::Numeric),
        "STRING" => Ok(ColumnType::Text),
        other => Err(TraceError::MalformedFile(format!("unsupported column type: {other}")).into()),
    }
}

fn write_document(document: &TabularDocument) -> FlResult<String> {
    let mut out = String::new();
    out.push_str(&format!("@RELATION {}\n\n", document.relation));
    for attribute in &document.attributes {
        out.push_str(&format!(
            "@ATTRIBUTE {} {}\n",
            attribute.name,
            render_column_type(&attribute.column_type)
        ));
    }
    out.push_str("\n@DATA\n");

    let mut writer = csv::WriterBuilder::new().quote(b'\'').from_writer(Vec::new());
    for row in &document.rows {
        let record: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Cell::Number(n) => render_number(*n),
                Cell::Text(s) => s.clone(),
            })
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| TraceError::Csv(e.to_string()))?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| TraceError::Csv(e.to_string()))?;
    let data = String::from_utf8(data).map_err(|e| TraceError::MalformedFile(e.to_string()))?;
    out.push_str(&data);
    Ok(out)
}

fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn parse_document(text: &str) -> FlResult<TabularDocument> {
    let mut relation = String::new();
    let mut attributes: Vec<TabularAttribute> = Vec::new();
    let mut data_lines: Vec<&str> = Vec::new();
    let mut in_data = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        if in_data {
            data_lines.push(trimmed);
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("@relation") {
            let offset = trimmed.len() - rest.len();
            relation = trimmed[offset..].trim().to_string();
        } else if let Some(rest) = lower.strip_prefix("@attribute") {
            let offset = trimmed.len() - rest.len();
            let declaration = trimmed[offset..].trim();
            let (name, column_type) = declaration
                .split_once(char::is_whitespace)
                .ok_or_else(|| {
                    TraceError::MalformedFile(format!("invalid attribute line: {trimmed}"))
                })?;
            attributes.push(TabularAttribute::new(name, parse_column_type(column_type.trim())?));
        } else if lower.starts_with("@data") {
            in_data = true;
        } else {
            return Err(TraceError::MalformedFile(format!("unexpected line: {trimmed}")).into());
        }
    }

    if !in_data {
        return Err(TraceError::MalformedFile("missing @DATA section".to_string()).into());
    }

    let mut rows = Vec::with_capacity(data_lines.len());
    if !data_lines.is_empty() {
        let joined = data_lines.join("\n");
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .quote(b'\'')
            .from_reader(joined.as_bytes());
        for record in reader.records() {
            let record = record.map_err(|e| TraceError::Csv(e.to_string()))?;
            if record.len() != attributes.len() {
                return Err(TraceError::MalformedFile(format!(
                    "row has {} fields, expected {}",
                    record.len(),
                    attributes.len()
                ))
                .into());
            }
            let mut row = Vec::with_capacity(record.len());
            for (value, attribute) in record.iter().zip(&attributes) {
                let cell = match attribute.column_type {
                    ColumnType::Numeric => {
                        Cell::Number(value.trim().parse::<f64>().map_err(|_| {
                            TraceError::InvalidField {
                                field: attribute.name.clone(),
                                value: value.to_string(),
                            }
                        })?)
                    }
                    _ => Cell::Text(value.to_string()),
                };
                row.push(cell);
            }
            rows.push(row);
        }
    }

    Ok(TabularDocument {
        relation,
        attributes,
        rows,
    })
}
