use thiserror::Error;

/// Main error type for the FlowLog system
#[derive(Error, Debug)]
pub enum FlError {
    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while converting models to flows and back
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Cannot convert value {value} of kind {kind}")]
    Unsupported { value: String, kind: &'static str },

    #[error("Found a second occurrence of component {name} while serializing {flow}")]
    DuplicateComponent { name: String, flow: String },

    #[error("Found step {identifier} shadowing an official parameter of {model}")]
    ShadowedStep { identifier: String, model: String },

    #[error("Unknown serialized object kind: {0}")]
    UnknownDiscriminator(String),

    #[error("Malformed serialized object: {0}")]
    MalformedEnvelope(String),

    #[error("Component reference {key} cannot be resolved without a component table")]
    MissingComponentTable { key: String },

    #[error("Component {key} is missing from the component table")]
    MissingComponent { key: String },

    #[error("Dependency {constraint} not satisfied (installed: {installed})")]
    DependencyMismatch { constraint: String, installed: String },

    #[error("Dependency package is not installed: {package}")]
    UnknownDependency { package: String },

    #[error("Invalid dependency constraint: {0}")]
    InvalidConstraint(String),

    #[error("Flows must not describe a sweep over the {parameter} parameter")]
    WorkerSweep { parameter: String },

    #[error("Parameter encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors raised while reading or writing optimization traces
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Trace misses required attribute: {0}")]
    MissingAttribute(String),

    #[error("Trace field missing: {0}")]
    MissingField(String),

    #[error("Expected {{\"true\", \"false\"}} value for selected field, received: {0}")]
    InvalidSelected(String),

    #[error("Run does not contain valid trace iterations")]
    MissingIterations,

    #[error("Could not find the selected iteration for repeat/fold {repeat}/{fold}")]
    NoSelectedIteration { repeat: u32, fold: u32 },

    #[error("Duplicate trace iteration ({repeat}, {fold}, {iteration})")]
    DuplicateIteration { repeat: u32, fold: u32, iteration: u32 },

    #[error("Invalid {field} value: {value}")]
    InvalidField { field: String, value: String },

    #[error("Invalid setup string: {0}")]
    InvalidSetup(String),

    #[error("Trace file doesn't exist: {0}")]
    FileNotFound(String),

    #[error("Malformed trace file: {0}")]
    MalformedFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),
}

/// Result type alias for FlowLog operations
pub type FlResult<T> = Result<T, FlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = FlowError::DependencyMismatch {
            constraint: "mlcraft==1.2.0".to_string(),
            installed: "1.1.0".to_string(),
        };

        assert!(error.to_string().contains("mlcraft==1.2.0"));
        assert!(error.to_string().contains("1.1.0"));
    }

    #[test]
    fn test_error_conversion() {
        let trace_error = TraceError::MissingAttribute("selected".to_string());
        let fl_error: FlError = trace_error.into();

        match fl_error {
            FlError::Trace(_) => (),
            _ => panic!("Expected Trace error"),
        }
    }
}
