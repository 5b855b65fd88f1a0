use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for test context operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Comprehensive error types for the variable/function resolution engine.
///
/// All variants are cloneable so that failures raised by forked actions can
/// be recorded in the test context and inspected later by the joining thread.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("IO error: {message}")]
    Io { message: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Can not create variable '{name}', please define proper variable name")]
    InvalidVariableName { name: String },

    #[error("Trying to set variable '{name}', but variable value is null")]
    NullVariableValue { name: String },

    #[error("Invalid variable usage - received {names} variable names with {values} values")]
    VariableCountMismatch { names: usize, values: usize },

    #[error("Unknown variable '{expression}'")]
    UnresolvableVariable { expression: String },

    #[error("Unable to extract value using expression '{expression}': {message}")]
    SegmentExtraction { expression: String, message: String },

    #[error("Unable to convert value of type '{source_kind}' to target type '{target}'")]
    ConversionFailed { source_kind: String, target: String },

    #[error("Unknown function '{name}'")]
    FunctionNotFound { name: String },

    #[error("Function '{name}' failed: {message}")]
    FunctionFailed { name: String, message: String },

    #[error("Unknown validation matcher '{name}'")]
    MatcherNotFound { name: String },

    #[error("Validation matcher '{matcher}' failed for field '{field}': {message}")]
    ValidationFailed {
        matcher: String,
        field: String,
        message: String,
    },

    #[error("Timer already registered with id '{id}'")]
    TimerAlreadyRegistered { id: String },

    #[error("General error: {message}")]
    General { message: String },
}

impl EngineError {
    /// Create a new IO error from the underlying error message
    pub fn io(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new unresolvable variable error
    pub fn unresolvable<S: Into<String>>(expression: S) -> Self {
        Self::UnresolvableVariable {
            expression: expression.into(),
        }
    }

    /// Create a new segment extraction error
    pub fn segment_extraction<S: Into<String>>(expression: S, message: S) -> Self {
        Self::SegmentExtraction {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// Create a new conversion error naming source and target kinds
    pub fn conversion_failed<S: Into<String>>(source_kind: S, target: S) -> Self {
        Self::ConversionFailed {
            source_kind: source_kind.into(),
            target: target.into(),
        }
    }

    /// Create a new function execution error
    pub fn function_failed<S: Into<String>>(name: S, message: S) -> Self {
        Self::FunctionFailed {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a new validation matcher error
    pub fn validation_failed<S: Into<String>>(matcher: S, field: S, message: S) -> Self {
        Self::ValidationFailed {
            matcher: matcher.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }
}
