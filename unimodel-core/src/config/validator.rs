//! Configuration validation utilities

use super::env::has_placeholder;
use super::error::{ValidationError, ValidationErrorKind};
use super::schema::CoreConfig;
use crate::redact::{Redactor, REDACTION_MARKER};
use std::collections::HashSet;

/// Configuration validator with rules beyond the structural checks
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Reject configs whose timeout is unset
    require_timeout: bool,
}

impl ConfigValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `default_timeout_ms` to be set
    pub fn require_timeout(mut self, required: bool) -> Self {
        self.require_timeout = required;
        self
    }

    /// Validate a configuration with extended rules
    pub fn validate(&self, config: &CoreConfig) -> Result<(), ValidationError> {
        config.validate()?;

        if self.require_timeout && config.default_timeout_ms.is_none() {
            return Err(ValidationError::required("default_timeout_ms"));
        }

        self.validate_prefixes(config)?;
        Ok(())
    }

    fn validate_prefixes(&self, config: &CoreConfig) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for (i, prefix) in config.redaction.extra_prefixes.iter().enumerate() {
            let path = format!("redaction.extra_prefixes[{}]", i);

            if has_placeholder(prefix) {
                return Err(ValidationError::invalid_format(path, "unresolved placeholder"));
            }
            if !seen.insert(prefix.as_str()) {
                return Err(ValidationError::new(
                    path,
                    ValidationErrorKind::DuplicateValue {
                        value: prefix.clone(),
                    },
                ));
            }
            if let Err(err) = Redactor::new().with_prefix(prefix.clone()) {
                return Err(ValidationError::invalid_format(path, err.to_string())
                    .with_context(format!("prefixes are matched against {}", REDACTION_MARKER)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_prefixes(prefixes: &[&str]) -> CoreConfig {
        let mut config = CoreConfig::default();
        config.redaction.extra_prefixes = prefixes.iter().map(|p| p.to_string()).collect();
        config
    }

    #[test]
    fn test_valid_prefixes() {
        let validator = ConfigValidator::new();
        assert!(validator.validate(&with_prefixes(&["acme-", "tok_"])).is_ok());
    }

    #[test]
    fn test_duplicate_prefix() {
        let err = ConfigValidator::new()
            .validate(&with_prefixes(&["acme-", "acme-"]))
            .unwrap_err();
        assert_eq!(err.field_path, "redaction.extra_prefixes[1]");
        assert!(matches!(err.kind, ValidationErrorKind::DuplicateValue { .. }));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        assert!(ConfigValidator::new().validate(&with_prefixes(&[""])).is_err());
    }

    #[test]
    fn test_require_timeout() {
        let validator = ConfigValidator::new().require_timeout(true);
        assert!(validator.validate(&CoreConfig::default()).is_err());
        let config = CoreConfig {
            default_timeout_ms: Some(30_000),
            ..Default::default()
        };
        assert!(validator.validate(&config).is_ok());
    }
}
