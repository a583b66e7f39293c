//! Error types for the CRS Arena evaluation core.
//!
//! Uses `thiserror` for public API error types. Structural problems in input
//! documents are hard errors; missing coverage (absent aspects, unmatched keys,
//! degenerate statistics) is never an error and is handled by omission or NaN.

/// Top-level error type for the evaluation core.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    MalformedIdentifier(#[from] MalformedIdentifier),

    #[error("Schema violation at {context}: {message}")]
    SchemaViolation { context: String, message: String },

    #[error("Failed to load gold data from {location}: {message}")]
    GoldLoad { location: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A conversation identifier that does not split into at least two `_` segments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unexpected conv_id format: {id:?}")]
pub struct MalformedIdentifier {
    pub id: String,
}

impl EvalError {
    pub fn schema(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn gold_load(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GoldLoad {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_violation_display() {
        let err = EvalError::schema("conv_id=barcor_redial_1 turn=2", "turn_ind is not an integer");
        assert_eq!(
            err.to_string(),
            "Schema violation at conv_id=barcor_redial_1 turn=2: turn_ind is not an integer"
        );
    }

    #[test]
    fn test_malformed_identifier_converts() {
        let err: EvalError = MalformedIdentifier {
            id: "onlyonepart".into(),
        }
        .into();
        assert!(matches!(err, EvalError::MalformedIdentifier(_)));
        assert!(err.to_string().contains("onlyonepart"));
    }
}
