//! Secret redaction for anything that may leave the process
//!
//! Vendor error bodies, echoed request headers and log lines can all carry API
//! keys. The [`Redactor`] masks key-shaped substrings before such text is
//! stored in a diagnostic or written to a log.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Replacement written over every detected key
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Key prefixes recognised out of the box
pub const DEFAULT_KEY_PREFIXES: &[&str] = &[
    "sk-", "sk-ant-", "sk-proj-", "xai-", "gsk_", "AIza", "hf_", "r8_", "pplx-", "ghp_",
];

/// Masks API-key-shaped substrings in arbitrary text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redactor {
    prefixes: Vec<String>,
}

impl Default for Redactor {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_KEY_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl Redactor {
    /// Create a redactor with the default prefix set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional vendor key prefix.
    ///
    /// The prefix must be non-empty ASCII, contain no terminator characters and
    /// must not occur inside [`REDACTION_MARKER`], otherwise redacting twice
    /// would no longer be a no-op.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Result<Self, CoreError> {
        let prefix = prefix.into();
        if prefix.is_empty() || !prefix.is_ascii() {
            return Err(CoreError::Configuration(format!(
                "redaction prefix must be non-empty ASCII, got {:?}",
                prefix
            )));
        }
        if prefix.bytes().any(is_terminator) {
            return Err(CoreError::Configuration(format!(
                "redaction prefix {:?} contains a terminator character",
                prefix
            )));
        }
        if REDACTION_MARKER.contains(prefix.as_str()) {
            return Err(CoreError::Configuration(format!(
                "redaction prefix {:?} overlaps the redaction marker",
                prefix
            )));
        }
        if !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
        Ok(self)
    }

    /// Prefixes currently recognised
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Returns true if `text` contains at least one key-shaped substring
    pub fn contains_secret(&self, text: &str) -> bool {
        self.find_key(text.as_bytes(), 0).is_some()
    }

    /// Replace every key-shaped run in `text` with [`REDACTION_MARKER`].
    ///
    /// Borrows the input when nothing matches.
    pub fn redact<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let bytes = text.as_bytes();
        let Some((mut start, mut end)) = self.find_key(bytes, 0) else {
            return Cow::Borrowed(text);
        };

        let mut out = String::with_capacity(text.len());
        let mut copied = 0;
        loop {
            // Prefixes and terminators are ASCII, so both offsets are char boundaries.
            out.push_str(&text[copied..start]);
            out.push_str(REDACTION_MARKER);
            copied = end;
            match self.find_key(bytes, end) {
                Some((s, e)) => {
                    start = s;
                    end = e;
                }
                None => break,
            }
        }
        out.push_str(&text[copied..]);
        Cow::Owned(out)
    }

    /// Locate the next key run at or after `from`, as a half-open byte range
    fn find_key(&self, bytes: &[u8], from: usize) -> Option<(usize, usize)> {
        let mut i = from;
        while i < bytes.len() {
            if i == 0 || !is_key_byte(bytes[i - 1]) {
                if let Some(len) = self.prefix_at(bytes, i) {
                    let body = i + len;
                    if body < bytes.len() && !is_terminator(bytes[body]) {
                        let end = bytes[body..]
                            .iter()
                            .position(|b| is_terminator(*b))
                            .map_or(bytes.len(), |p| body + p);
                        return Some((i, end));
                    }
                }
            }
            i += 1;
        }
        None
    }

    fn prefix_at(&self, bytes: &[u8], at: usize) -> Option<usize> {
        self.prefixes
            .iter()
            .filter(|p| bytes[at..].starts_with(p.as_bytes()))
            .map(|p| p.len())
            .max()
    }
}

fn is_key_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

fn is_terminator(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(
            b,
            b'"' | b'\'' | b'`' | b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'<' | b'>' | b','
        )
}

/// A wrapper type for sensitive strings like API keys
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Get the actual value (use with caution)
    pub fn expose_secret(&self) -> &str {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTION_MARKER)
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTION_MARKER)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
