//! Error types for pmv-validator

use thiserror::Error;

/// Validator error type
#[derive(Debug, Error)]
pub enum ValidatorError {
    /// Malformed context, options or batch request; rejected before any layer runs
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected failure inside the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// A single business rule failed internally
    #[error("Rule '{rule}' failed: {message}")]
    Rule { rule: String, message: String },

    /// A single external verifier failed
    #[error("Verifier '{verifier}' failed: {message}")]
    Verifier { verifier: String, message: String },

    /// An external verifier did not answer in time
    #[error("Verifier '{verifier}' timed out after {after_ms} ms")]
    Timeout { verifier: String, after_ms: u64 },

    /// pmv-common error
    #[error("Common error: {0}")]
    Common(#[from] pmv_common::Error),
}

impl ValidatorError {
    pub fn rule(rule: &str, message: impl Into<String>) -> Self {
        Self::Rule {
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    pub fn verifier(verifier: &str, message: impl Into<String>) -> Self {
        Self::Verifier {
            verifier: verifier.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for validator operations
pub type ValidatorResult<T> = Result<T, ValidatorError>;
