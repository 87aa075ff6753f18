//! Error diagnostic classification
//!
//! Vendor bindings report the HTTP status and raw body of a failed call here.
//! The [`Classifier`] maps them into the closed [`ErrorKind`] taxonomy, decides
//! retryability, and keeps only redacted, truncated excerpts of the body.

use crate::error::CoreError;
use crate::redact::Redactor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Longest raw response excerpt kept on a diagnostic (in chars)
pub const MAX_EXCERPT_CHARS: usize = 512;

/// Longest human message kept on a diagnostic (in chars)
pub const MAX_MESSAGE_CHARS: usize = 300;

/// Closed failure taxonomy for remote calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    Authentication,
    InvalidRequest,
    NotFound,
    Server,
    Network,
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status code to a kind
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            404 => Self::NotFound,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            400..=499 => Self::InvalidRequest,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Authentication => "authentication",
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::Server => "server",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    fn generic_message(&self) -> &'static str {
        match self {
            Self::RateLimit => "Rate limit exceeded",
            Self::Authentication => "Authentication failed",
            Self::InvalidRequest => "Invalid request",
            Self::NotFound => "Resource not found",
            Self::Server => "Provider server error",
            Self::Network => "Network error",
            Self::Unknown => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry verdict for a kind and an optional status
pub fn is_retryable(kind: ErrorKind, status: Option<u16>) -> bool {
    matches!(
        kind,
        ErrorKind::RateLimit | ErrorKind::Server | ErrorKind::Network
    ) || matches!(status, Some(408) | Some(409))
}

/// Normalized failure record produced by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDiagnostic {
    /// HTTP status, absent when no response was received
    pub status: Option<u16>,

    pub kind: ErrorKind,

    /// Short human-readable message (redacted)
    pub message: String,

    /// Provider that produced the failure
    pub provider: String,

    pub is_retryable: bool,

    /// Redacted, truncated excerpt of the raw response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_excerpt: Option<String>,

    /// Server-suggested wait before retrying
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<Duration>,
}

impl ErrorDiagnostic {
    /// Classify with the default redactor
    pub fn from_status(provider: &str, status: u16, body: Option<&str>) -> Self {
        Classifier::new().classify(provider, Some(status), body)
    }

    /// Transport failure with no HTTP response
    pub fn network(provider: &str, message: &str) -> Self {
        Classifier::new().classify_transport(provider, message)
    }

    /// Describe any core failure as a diagnostic for a caller's sink.
    ///
    /// API call failures keep their classification; local failures are
    /// reported as non-retryable `Unknown`.
    pub fn from_error(provider: &str, error: &CoreError) -> Self {
        match error {
            CoreError::ApiCall(diagnostic) => diagnostic.clone(),
            other => Self {
                status: None,
                kind: ErrorKind::Unknown,
                message: Redactor::new().redact(&other.to_string()).into_owned(),
                provider: provider.to_string(),
                is_retryable: false,
                response_excerpt: None,
                retry_after: None,
            },
        }
    }

    /// Attach a retry-after hint, typically from a response header
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl fmt::Display for ErrorDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} {} error (HTTP {}): {}",
                self.provider, self.kind, status, self.message
            ),
            None => write!(f, "{} {} error: {}", self.provider, self.kind, self.message),
        }
    }
}

/// Maps status codes and vendor bodies into [`ErrorDiagnostic`]s
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    redactor: Redactor,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redactor(redactor: Redactor) -> Self {
        Self { redactor }
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Classify a failed call.
    ///
    /// `status` is `None` when no HTTP response was received at all; such
    /// failures are always `Network`.
    pub fn classify(&self, provider: &str, status: Option<u16>, body: Option<&str>) -> ErrorDiagnostic {
        let kind = match status {
            Some(code) => ErrorKind::from_status(code),
            None => ErrorKind::Network,
        };

        let details = body
            .and_then(|b| serde_json::from_str::<Value>(b).ok())
            .and_then(|v| extract_error_details(&v));

        let message = match details.as_ref().map(|d| d.message.as_str()) {
            Some(text) if !text.trim().is_empty() => self.sanitize(text, MAX_MESSAGE_CHARS),
            _ => match status {
                Some(code) => format!("{} (HTTP {})", kind.generic_message(), code),
                None => kind.generic_message().to_string(),
            },
        };

        let response_excerpt = body
            .filter(|b| !b.trim().is_empty())
            .map(|b| self.sanitize(b, MAX_EXCERPT_CHARS));

        let diagnostic = ErrorDiagnostic {
            status,
            kind,
            message,
            provider: provider.to_string(),
            is_retryable: is_retryable(kind, status),
            response_excerpt,
            retry_after: details
                .and_then(|d| d.retry_after_seconds)
                .map(Duration::from_secs),
        };

        debug!(
            provider = provider,
            status = ?status,
            kind = %diagnostic.kind,
            retryable = diagnostic.is_retryable,
            "classified provider failure"
        );

        diagnostic
    }

    /// Classify a transport failure where no response arrived
    pub fn classify_transport(&self, provider: &str, message: &str) -> ErrorDiagnostic {
        let mut diagnostic = self.classify(provider, None, None);
        if !message.trim().is_empty() {
            diagnostic.message = self.sanitize(message, MAX_MESSAGE_CHARS);
        }
        diagnostic
    }

    /// Classify an error raised by a `reqwest`-based vendor transport
    pub fn classify_reqwest_error(&self, provider: &str, err: &reqwest::Error) -> ErrorDiagnostic {
        match err.status() {
            Some(status) => {
                let mut diagnostic = self.classify(provider, Some(status.as_u16()), None);
                diagnostic.message = self.sanitize(&err.to_string(), MAX_MESSAGE_CHARS);
                diagnostic
            }
            None => self.classify_transport(provider, &err.to_string()),
        }
    }

    fn sanitize(&self, text: &str, max_chars: usize) -> String {
        truncate_chars(&self.redactor.redact(text), max_chars)
    }
}

/// Parse a `Retry-After` header value given in seconds
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    header_value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

struct ErrorDetails {
    message: String,
    retry_after_seconds: Option<u64>,
}

/// Pull a message out of the common vendor error shapes
fn extract_error_details(json: &Value) -> Option<ErrorDetails> {
    // { "error": { "message": "...", "retry_after": 5 } }
    if let Some(error) = json.get("error") {
        if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
            return Some(ErrorDetails {
                message: message.to_string(),
                retry_after_seconds: error
                    .get("retry_after")
                    .or_else(|| json.get("retry_after"))
                    .and_then(|v| v.as_u64()),
            });
        }
        if let Some(message) = error.as_str() {
            return Some(ErrorDetails {
                message: message.to_string(),
                retry_after_seconds: json.get("retry_after").and_then(|v| v.as_u64()),
            });
        }
    }

    for key in ["message", "detail"] {
        if let Some(message) = json.get(key).and_then(|v| v.as_str()) {
            return Some(ErrorDetails {
                message: message.to_string(),
                retry_after_seconds: json.get("retry_after").and_then(|v| v.as_u64()),
            });
        }
    }

    None
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
