//! Model capability contract
//!
//! Every vendor model implements one capability trait behind dynamic
//! dispatch. Implementations never panic or retry on their own for expected
//! failures: they return a tagged [`GenerateResult`], record the failure in the
//! caller's [`DiagnosticSink`], and leave retries to the shared
//! [`CallDriver`].

mod driver;
mod embedding;

pub use driver::CallDriver;
pub use embedding::embed_many;

use crate::context::RequestContext;
use crate::diagnostics::ErrorDiagnostic;
use crate::error::CoreError;
use crate::protocol::{
    EmbeddingInput, EmbeddingOutput, ImageInput, ImageOutput, LanguageInput, LanguageOutput,
    ResponseMetadata, SpeechInput, SpeechOutput, TranscriptionInput, TranscriptionOutput, Usage,
    Warning,
};
use crate::retry::RetryPolicy;
use crate::streaming::{replay_generation, StreamSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// The capabilities a provider may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Language,
    Embedding,
    Image,
    Speech,
    Transcription,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 5] = [
        Self::Language,
        Self::Embedding,
        Self::Image,
        Self::Speech,
        Self::Transcription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Language => "language",
            Self::Embedding => "embedding",
            Self::Image => "image",
            Self::Speech => "speech",
            Self::Transcription => "transcription",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a resolved model; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelDescriptor {
    provider: String,
    model_id: String,
    capability: CapabilityKind,
}

impl ModelDescriptor {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>, capability: CapabilityKind) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            capability,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn capability(&self) -> CapabilityKind {
        self.capability
    }
}

impl fmt::Display for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.provider, self.model_id, self.capability)
    }
}

/// Successful result of a model call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation<T> {
    pub content: T,
    pub usage: Usage,
    pub warnings: Vec<Warning>,
    pub response: ResponseMetadata,
}

impl<T> Generation<T> {
    pub fn new(content: T) -> Self {
        Self {
            content,
            usage: Usage::default(),
            warnings: Vec::new(),
            response: ResponseMetadata::default(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_warning(mut self, warning: Warning) -> Self {
        self.warnings.push(warning);
        self
    }

    pub fn with_response(mut self, response: ResponseMetadata) -> Self {
        self.response = response;
        self
    }
}

/// Tagged outcome of `generate`; failures are values, never panics
pub type GenerateResult<T> = Result<Generation<T>, CoreError>;

/// Caller-owned slot that receives the diagnostic of a failed call.
///
/// Clones share the slot, so the caller keeps one clone and passes another
/// in the call options.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    slot: Arc<Mutex<Option<ErrorDiagnostic>>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a diagnostic, replacing any earlier one
    pub fn record(&self, diagnostic: ErrorDiagnostic) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(diagnostic);
    }

    pub fn get(&self) -> Option<ErrorDiagnostic> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Option<ErrorDiagnostic> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// Per-call options: capability input plus the common fields
#[derive(Debug, Clone)]
pub struct CallOptions<I> {
    pub input: I,

    /// Extra request headers forwarded by the binding
    pub headers: HashMap<String, String>,

    /// Vendor-specific options; the core never interprets this value
    pub provider_options: Option<serde_json::Value>,

    pub context: Option<RequestContext>,

    /// Overrides the driver's default retry policy
    pub retry_policy: Option<RetryPolicy>,

    pub diagnostic: Option<DiagnosticSink>,
}

impl<I> CallOptions<I> {
    pub fn new(input: I) -> Self {
        Self {
            input,
            headers: HashMap::new(),
            provider_options: None,
            context: None,
            retry_policy: None,
            diagnostic: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_provider_options(mut self, options: serde_json::Value) -> Self {
        self.provider_options = Some(options);
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    pub fn with_diagnostic(mut self, sink: DiagnosticSink) -> Self {
        self.diagnostic = Some(sink);
        self
    }

    pub fn context(&self) -> Option<&RequestContext> {
        self.context.as_ref()
    }

    /// Same common fields, different input
    pub fn with_input<J>(&self, input: J) -> CallOptions<J> {
        CallOptions {
            input,
            headers: self.headers.clone(),
            provider_options: self.provider_options.clone(),
            context: self.context.clone(),
            retry_policy: self.retry_policy.clone(),
            diagnostic: self.diagnostic.clone(),
        }
    }

    /// Record a failure in the caller's diagnostic sink, if one was supplied
    pub fn record_failure(&self, provider: &str, error: &CoreError) {
        if let Some(sink) = &self.diagnostic {
            sink.record(ErrorDiagnostic::from_error(provider, error));
        }
    }
}

/// Identity shared by every capability
pub trait Model: Send + Sync {
    fn descriptor(&self) -> &ModelDescriptor;

    fn provider(&self) -> &str {
        self.descriptor().provider()
    }

    fn model_id(&self) -> &str {
        self.descriptor().model_id()
    }
}

#[async_trait]
pub trait LanguageModel: Model {
    async fn generate(&self, options: CallOptions<LanguageInput>) -> GenerateResult<LanguageOutput>;

    /// Stream a response into `sink`.
    ///
    /// The default serves the stream from a single `generate` call.
    async fn stream(
        &self,
        options: CallOptions<LanguageInput>,
        sink: &mut (dyn StreamSink + Send),
    ) -> Result<(), CoreError> {
        let driver = CallDriver::new(self.descriptor());
        let call = options.clone();
        driver
            .stream(&options, sink, |mut pipeline| async move {
                let result = match self.generate(call).await {
                    Ok(generation) => replay_generation(&mut pipeline, generation),
                    Err(err) => Err(err),
                };
                (pipeline, result)
            })
            .await
    }
}

#[async_trait]
pub trait EmbeddingModel: Model {
    async fn generate(&self, options: CallOptions<EmbeddingInput>) -> GenerateResult<EmbeddingOutput>;

    /// Largest number of values one vendor call accepts; `None` for no limit
    fn max_values_per_call(&self) -> Option<usize> {
        None
    }
}

#[async_trait]
pub trait ImageModel: Model {
    async fn generate(&self, options: CallOptions<ImageInput>) -> GenerateResult<ImageOutput>;
}

#[async_trait]
pub trait SpeechModel: Model {
    async fn generate(&self, options: CallOptions<SpeechInput>) -> GenerateResult<SpeechOutput>;
}

#[async_trait]
pub trait TranscriptionModel: Model {
    async fn generate(
        &self,
        options: CallOptions<TranscriptionInput>,
    ) -> GenerateResult<TranscriptionOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor() {
        let descriptor = ModelDescriptor::new("openai", "gpt-4o", CapabilityKind::Language);
        assert_eq!(descriptor.provider(), "openai");
        assert_eq!(descriptor.model_id(), "gpt-4o");
        assert_eq!(descriptor.to_string(), "openai:gpt-4o (language)");
    }

    #[test]
    fn test_diagnostic_sink_is_shared() {
        let sink = DiagnosticSink::new();
        let options = CallOptions::new(()).with_diagnostic(sink.clone());
        assert!(!sink.is_set());
        options.record_failure("openai", &CoreError::Cancelled);
        assert!(sink.is_set());
        assert_eq!(sink.get().unwrap().provider, "openai");
        assert!(sink.take().is_some());
        assert!(!sink.is_set());
    }

    #[test]
    fn test_with_input_keeps_common_fields() {
        let ctx = RequestContext::new();
        let options = CallOptions::new(1u8)
            .with_header("x-trace", "abc")
            .with_context(ctx.clone())
            .with_retry_policy(RetryPolicy::no_retry());
        let mapped = options.with_input("other");
        assert_eq!(mapped.input, "other");
        assert_eq!(mapped.headers.get("x-trace").map(String::as_str), Some("abc"));
        assert_eq!(mapped.context().unwrap().request_id(), ctx.request_id());
        assert_eq!(mapped.retry_policy, Some(RetryPolicy::no_retry()));
    }
}
