//! Configuration schema

use super::error::{ValidationError, ValidationErrorKind};
use crate::registry::DEFAULT_SEPARATOR;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration for the shared call infrastructure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoreConfig {
    /// Configuration schema version
    #[serde(default = "default_version")]
    pub version: String,

    /// Retry policy used when a call supplies none
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Deadline applied to contexts built from this config (milliseconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_ms: Option<u64>,

    #[serde(default)]
    pub redaction: RedactionConfig,

    #[serde(default)]
    pub registry: RegistryConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            retry: RetryPolicy::default(),
            default_timeout_ms: None,
            redaction: RedactionConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

/// Secret redaction settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionConfig {
    /// Key prefixes masked in addition to the built-in set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_prefixes: Vec<String>,
}

/// Model id addressing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Separator between provider name and model id
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            separator: default_separator(),
        }
    }
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

impl CoreConfig {
    /// Built-in structural validation
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version.is_empty() {
            return Err(ValidationError::required("version"));
        }
        if self.version != CONFIG_VERSION {
            return Err(ValidationError::new(
                "version",
                ValidationErrorKind::InvalidVersion {
                    expected: CONFIG_VERSION.to_string(),
                    actual: self.version.clone(),
                },
            ));
        }

        validate_retry(&self.retry, "retry")?;

        if self.default_timeout_ms == Some(0) {
            return Err(ValidationError::out_of_range(
                "default_timeout_ms",
                "timeout must be greater than zero",
            ));
        }

        let separator = self.registry.separator;
        if separator.is_whitespace() || separator.is_control() {
            return Err(ValidationError::invalid_format(
                "registry.separator",
                format!("{:?} cannot separate provider and model", separator),
            ));
        }

        Ok(())
    }
}

fn validate_retry(policy: &RetryPolicy, path: &str) -> Result<(), ValidationError> {
    if !policy.exponential_base.is_finite() || policy.exponential_base < 1.0 {
        return Err(ValidationError::out_of_range(
            format!("{}.exponential_base", path),
            format!("must be at least 1.0, got {}", policy.exponential_base),
        ));
    }
    if !(0.0..=1.0).contains(&policy.jitter_factor) {
        return Err(ValidationError::out_of_range(
            format!("{}.jitter_factor", path),
            format!("must be between 0.0 and 1.0, got {}", policy.jitter_factor),
        ));
    }
    if policy.initial_delay_ms > policy.max_delay_ms {
        return Err(ValidationError::out_of_range(
            format!("{}.initial_delay_ms", path),
            format!(
                "initial delay {}ms exceeds max delay {}ms",
                policy.initial_delay_ms, policy.max_delay_ms
            ),
        ));
    }
    Ok(())
}
