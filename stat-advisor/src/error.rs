//! Error types for the statistical analysis advisor.
//!
//! All fallible operations in this crate return [`AdvisorError`]. Most engine
//! outcomes that are "bad news" for a study (an infeasible analysis, an
//! unresolved variable, a failed AI call) are reported as data rather than as
//! errors; the variants here are reserved for conditions the caller must act on.

use thiserror::Error;

/// The main error type for the advisor.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// The schema tree cannot be turned into an analysis context.
    #[error("Malformed schema at '{path}': {message}")]
    MalformedSchema {
        /// Dotted path of the offending node
        path: String,
        /// Detailed error message
        message: String,
    },

    /// Two schema nodes share the same variable id.
    #[error("Duplicate variable id '{id}' in schema")]
    DuplicateVariable { id: String },

    /// A review or execution referenced a suggestion the queue does not hold.
    #[error("Suggestion '{id}' not found in queue")]
    SuggestionNotFound { id: String },

    /// A numeric routine could not produce a result.
    #[error("Execution of {analysis} failed: {message}")]
    Execution {
        /// Analysis type being executed
        analysis: String,
        /// Detailed error message
        message: String,
    },

    /// The external text generator failed.
    #[error("Text generation failed: {message}")]
    Generation {
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The external text generator did not answer in time.
    #[error("Text generation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// A generated response could not be parsed into the expected shape.
    #[error("Response parse error: {0}")]
    ResponseParse(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error related to configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, AdvisorError>`.
///
/// # Examples
///
/// ```rust
/// use stat_advisor::error::{AdvisorError, Result};
///
/// fn require_alpha(alpha: f64) -> Result<f64> {
///     if alpha <= 0.0 || alpha >= 1.0 {
///         return Err(AdvisorError::Configuration(format!("alpha {alpha} out of range")));
///     }
///     Ok(alpha)
/// }
///
/// assert!(require_alpha(0.05).is_ok());
/// ```
pub type Result<T> = std::result::Result<T, AdvisorError>;

impl AdvisorError {
    /// Creates a malformed schema error for the node at `path`.
    pub fn malformed_schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSchema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an execution error for the given analysis.
    pub fn execution(analysis: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            analysis: analysis.into(),
            message: message.into(),
        }
    }

    /// Creates a generation error without a source.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a generation error wrapping the transport error.
    pub fn generation_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Generation {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a response parse error.
    pub fn response_parse(message: impl Into<String>) -> Self {
        Self::ResponseParse(message.into())
    }

    /// Returns true when the error came from the external generator boundary.
    ///
    /// These errors are absorbed by the planner and never surface past a merge.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            Self::Generation { .. } | Self::Timeout { .. } | Self::ResponseParse(_)
        )
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_malformed_schema_message() {
        let err = AdvisorError::malformed_schema("demographics.age", "variable has no id");
        assert_eq!(
            err.to_string(),
            "Malformed schema at 'demographics.age': variable has no id"
        );
    }

    #[test]
    fn test_generation_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = AdvisorError::generation_with_source("model unavailable", Box::new(source));
        assert!(err.source().is_some());
        assert!(err.is_external());
    }

    #[test]
    fn test_internal_errors_are_not_external() {
        assert!(!AdvisorError::Internal("x".into()).is_external());
        assert!(!AdvisorError::execution("t-test", "zero variance").is_external());
        assert!(AdvisorError::Timeout { seconds: 30 }.is_external());
    }

    #[test]
    fn test_serde_conversion() {
        let err: AdvisorError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, AdvisorError::Serialization(_)));
    }
}
