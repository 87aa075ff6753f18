//! Core error types

use crate::diagnostics::{ErrorDiagnostic, ErrorKind};
use crate::registry::LookupError;
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures surfaced by the core and by vendor bindings built on it
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Malformed caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request context was cancelled or its deadline passed
    #[error("Request cancelled")]
    Cancelled,

    /// Missing transport, credentials or other configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A remote call failed; carries the classified diagnostic
    #[error("{0}")]
    ApiCall(ErrorDiagnostic),

    /// The vendor response could not be parsed
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A local resource limit was hit
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Model resolution failed
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

impl CoreError {
    /// Only classified API call failures may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiCall(diagnostic) => diagnostic.is_retryable,
            _ => false,
        }
    }

    /// The classified diagnostic, if this is an API call failure
    pub fn diagnostic(&self) -> Option<&ErrorDiagnostic> {
        match self {
            Self::ApiCall(diagnostic) => Some(diagnostic),
            _ => None,
        }
    }

    /// Taxonomy kind for this failure; non-API failures map to `Unknown`
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ApiCall(diagnostic) => diagnostic.kind,
            _ => ErrorKind::Unknown,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<ErrorDiagnostic> for CoreError {
    fn from(diagnostic: ErrorDiagnostic) -> Self {
        CoreError::ApiCall(diagnostic)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Parse(err.to_string())
    }
}
