//! # fl-trace
//!
//! Reader/writer for optimization traces: the per-iteration records of a
//! hyperparameter search, convertible to and from a tabular document and an
//! XML-shaped document, plus selected-iteration lookup.

pub mod files;
pub mod tabular;
pub mod trace;
pub mod xml;

pub use files::TRACE_FILE_NAME;
pub use tabular::{
    Cell, ColumnType, DuplicatePolicy, TabularAttribute, TabularDocument, REQUIRED_ATTRIBUTES,
    SETUP_STRING_ATTRIBUTE, TRACE_RELATION,
};
pub use trace::{RunTrace, TraceIteration, TraceKey};
pub use xml::{
    XML_EVALUATION, XML_FOLD, XML_ITERATION, XML_REPEAT, XML_RUN_ID, XML_SELECTED,
    XML_SETUP_STRING, XML_TRACE, XML_TRACE_ITERATION,
};
