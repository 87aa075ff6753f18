//! Configuration for the shared call infrastructure
//!
//! A [`CoreConfig`] is loaded once at the application root (YAML or JSON,
//! with `${VAR}` environment interpolation) and turned into the runtime
//! pieces: redactor, classifier, default retry policy, request contexts and
//! the provider registry.

mod env;
mod error;
mod schema;
mod validator;

pub use env::interpolate_env_vars;
pub use error::{ConfigError, ConfigResult, ValidationError, ValidationErrorKind};
pub use schema::{CoreConfig, RedactionConfig, RegistryConfig, CONFIG_VERSION};
pub use validator::ConfigValidator;

use crate::context::RequestContext;
use crate::diagnostics::Classifier;
use crate::model::{CallDriver, ModelDescriptor};
use crate::redact::Redactor;
use crate::registry::ProviderRegistry;
use crate::retry::RetryPolicy;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Load a configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> ConfigResult<CoreConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_yaml(&content, &path.to_string_lossy())
}

/// Load a configuration from a JSON file
pub fn load_from_json<P: AsRef<Path>>(path: P) -> ConfigResult<CoreConfig> {
    let path = path.as_ref();
    let content = read(path)?;
    parse_json(&content, &path.to_string_lossy())
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_string_lossy().to_string(),
        source: e,
    })
}

fn parse_yaml(content: &str, origin: &str) -> ConfigResult<CoreConfig> {
    let interpolated = env::interpolate_env_vars(content)?;
    let config: CoreConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: e.location().map(|l| l.line()),
            column: e.location().map(|l| l.column()),
            message: e.to_string(),
        })?;
    finish(config, origin)
}

fn parse_json(content: &str, origin: &str) -> ConfigResult<CoreConfig> {
    let interpolated = env::interpolate_env_vars(content)?;
    let config: CoreConfig =
        serde_json::from_str(&interpolated).map_err(|e| ConfigError::ParseError {
            path: origin.to_string(),
            line: Some(e.line()),
            column: Some(e.column()),
            message: e.to_string(),
        })?;
    finish(config, origin)
}

fn finish(config: CoreConfig, origin: &str) -> ConfigResult<CoreConfig> {
    ConfigValidator::new().validate(&config)?;
    debug!(
        source = origin,
        max_retries = config.retry.max_retries,
        "configuration loaded"
    );
    Ok(config)
}

impl CoreConfig {
    /// Parse and validate YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        parse_yaml(content, "<string>")
    }

    /// Parse and validate JSON text
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        parse_json(content, "<string>")
    }

    /// Default prefixes plus the configured extras
    pub fn redactor(&self) -> ConfigResult<Redactor> {
        self.redaction
            .extra_prefixes
            .iter()
            .try_fold(Redactor::new(), |redactor, prefix| redactor.with_prefix(prefix.clone()))
            .map_err(|e| ConfigError::Invalid {
                message: e.to_string(),
            })
    }

    pub fn classifier(&self) -> ConfigResult<Classifier> {
        Ok(Classifier::with_redactor(self.redactor()?))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }

    /// Fresh context carrying the configured default deadline
    pub fn request_context(&self) -> RequestContext {
        match self.default_timeout() {
            Some(timeout) => RequestContext::new().with_timeout(timeout),
            None => RequestContext::new(),
        }
    }

    /// Empty registry using the configured separator
    pub fn registry(&self) -> ProviderRegistry {
        ProviderRegistry::new().with_separator(self.registry.separator)
    }

    /// Call driver whose fallback retry policy comes from this config
    pub fn call_driver<'a>(&self, descriptor: &'a ModelDescriptor) -> CallDriver<'a> {
        CallDriver::new(descriptor).with_default_retry(self.retry_policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CapabilityKind;

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
retry:
  max_retries: 5
  initial_delay_ms: 50
default_timeout_ms: 30000
redaction:
  extra_prefixes: ["acme-"]
registry:
  separator: "/"
"#;
        let config = CoreConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay_ms, 50);
        assert_eq!(config.retry.max_delay_ms, RetryPolicy::default().max_delay_ms);
        assert_eq!(config.default_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.registry().separator(), '/');

        let redactor = config.redactor().unwrap();
        assert_eq!(redactor.redact("token acme-12345"), "token [REDACTED]");
    }

    #[test]
    fn test_from_json_str() {
        let config = CoreConfig::from_json_str(r#"{"retry": {"max_retries": 0}}"#).unwrap();
        assert_eq!(config.retry_policy().max_retries, 0);
        assert!(config.default_timeout().is_none());
        assert!(config.request_context().deadline().is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = CoreConfig::from_yaml_str("retry:\n  jitter_factor: 2.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = CoreConfig::from_json_str("{\"retry\": ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_request_context_deadline() {
        let config = CoreConfig {
            default_timeout_ms: Some(60_000),
            ..Default::default()
        };
        let ctx = config.request_context();
        assert!(ctx.deadline().is_some());
        assert!(!ctx.is_expired());
    }

    #[test]
    fn test_call_driver_uses_configured_retry() {
        let config = CoreConfig::from_yaml_str("retry:\n  max_retries: 1\n").unwrap();
        let descriptor = ModelDescriptor::new("acme", "m", CapabilityKind::Language);
        let driver = config.call_driver(&descriptor);
        assert_eq!(driver.descriptor().model_id(), "m");
    }
}
