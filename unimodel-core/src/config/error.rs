use thiserror::Error;

/// Failure while loading or checking a [`CoreConfig`](super::CoreConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}{}: {message}", location(.line, .column))]
    ParseError {
        path: String,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },

    #[error(transparent)]
    ValidationError(#[from] ValidationError),

    #[error("config references ${{{var}}} but it is not set and has no fallback")]
    EnvVarNotFound { var: String },

    #[error("config cannot be applied: {message}")]
    Invalid { message: String },
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(":{}:{}", line, column),
        (Some(line), None) => format!(":{}", line),
        _ => String::new(),
    }
}

/// A semantically wrong value at a dotted field path such as `retry.jitter_factor`
#[derive(Debug, Error)]
#[error("{field_path}: {kind}{}", .context.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default())]
pub struct ValidationError {
    pub field_path: String,
    pub kind: ValidationErrorKind,
    /// Extra detail, usually the offending value
    pub context: Option<String>,
}

#[derive(Debug, Error)]
pub enum ValidationErrorKind {
    #[error("must be set")]
    RequiredFieldMissing,

    #[error("{message}")]
    OutOfRange { message: String },

    #[error("malformed, {message}")]
    InvalidFormat { message: String },

    #[error("{value:?} is listed more than once")]
    DuplicateValue { value: String },

    #[error("config version {actual:?} is not supported (this build reads {expected:?})")]
    InvalidVersion { expected: String, actual: String },
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn required(field_path: impl Into<String>) -> Self {
        Self::new(field_path, ValidationErrorKind::RequiredFieldMissing)
    }

    pub fn out_of_range(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::OutOfRange {
                message: message.into(),
            },
        )
    }

    pub fn invalid_format(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            field_path,
            ValidationErrorKind::InvalidFormat {
                message: message.into(),
            },
        )
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_location() {
        let err = ConfigError::ParseError {
            path: "unimodel.yaml".into(),
            line: Some(3),
            column: Some(7),
            message: "unexpected ']'".into(),
        };
        assert_eq!(err.to_string(), "unimodel.yaml:3:7: unexpected ']'");

        let err = ConfigError::ParseError {
            path: "unimodel.json".into(),
            line: None,
            column: None,
            message: "eof".into(),
        };
        assert_eq!(err.to_string(), "unimodel.json: eof");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::out_of_range("retry.jitter_factor", "must be within [0, 1]")
            .with_context("got 1.5");
        assert_eq!(
            err.to_string(),
            "retry.jitter_factor: must be within [0, 1] [got 1.5]"
        );
        let wrapped: ConfigError = err.into();
        assert!(wrapped.to_string().starts_with("retry.jitter_factor"));
    }

    #[test]
    fn test_missing_env_var_message() {
        let err = ConfigError::EnvVarNotFound {
            var: "OPENAI_KEY".into(),
        };
        assert!(err.to_string().contains("${OPENAI_KEY}"));
    }
}
