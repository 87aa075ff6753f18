//! Scripted provider and models shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use unimodel_core::context::RequestContext;
use unimodel_core::diagnostics::ErrorDiagnostic;
use unimodel_core::model::{
    CallDriver, CallOptions, CapabilityKind, EmbeddingModel, GenerateResult, Generation,
    LanguageModel, Model, ModelDescriptor,
};
use unimodel_core::protocol::{
    EmbeddingInput, EmbeddingOutput, FinishReason, LanguageInput, LanguageOutput, Usage,
};
use unimodel_core::registry::{LookupError, Provider};
use unimodel_core::retry::RetryPolicy;
use unimodel_core::CoreError;

pub const PROVIDER: &str = "mock";

/// Fast retries with no jitter
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        exponential_base: 1.0,
        jitter_factor: 0.0,
        respect_retry_after: false,
    }
}

pub fn server_error() -> CoreError {
    CoreError::ApiCall(ErrorDiagnostic::from_status(PROVIDER, 503, None))
}

pub fn bad_request() -> CoreError {
    CoreError::ApiCall(ErrorDiagnostic::from_status(
        PROVIDER,
        400,
        Some(r#"{"error":{"message":"bad field"}}"#),
    ))
}

pub fn text_output(text: &str) -> LanguageOutput {
    LanguageOutput {
        text: text.to_string(),
        tool_calls: Vec::new(),
        finish_reason: Some(FinishReason::Stop),
    }
}

/// Language model that replays a fixed list of per-attempt outcomes.
/// Once the script runs out every attempt succeeds with "ok".
pub struct ScriptedLanguageModel {
    descriptor: ModelDescriptor,
    script: Mutex<VecDeque<Result<LanguageOutput, CoreError>>>,
    calls: AtomicU32,
}

impl ScriptedLanguageModel {
    pub fn new(model_id: &str) -> Self {
        Self::with_outcomes(model_id, Vec::new())
    }

    pub fn with_outcomes(model_id: &str, outcomes: Vec<Result<LanguageOutput, CoreError>>) -> Self {
        Self {
            descriptor: ModelDescriptor::new(PROVIDER, model_id, CapabilityKind::Language),
            script: Mutex::new(outcomes.into()),
            calls: AtomicU32::new(0),
        }
    }

    /// Number of attempts that reached the vendor
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> GenerateResult<LanguageOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(Generation::new(output).with_usage(Usage::new(3, 5))),
            Some(Err(err)) => Err(err),
            None => Ok(Generation::new(text_output("ok")).with_usage(Usage::new(3, 5))),
        }
    }
}

impl Model for ScriptedLanguageModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn generate(&self, options: CallOptions<LanguageInput>) -> GenerateResult<LanguageOutput> {
        CallDriver::new(&self.descriptor)
            .generate(&options, move || async move { self.next_outcome() })
            .await
    }
}

/// Embedding model returning `[value length, call number]` per value; optionally
/// failing on the n-th call.
pub struct MockEmbeddingModel {
    descriptor: ModelDescriptor,
    max_per_call: Option<usize>,
    fail_on_call: Option<u32>,
    cancel_after: Option<(u32, RequestContext)>,
    calls: AtomicU32,
    batches: Mutex<Vec<usize>>,
}

impl MockEmbeddingModel {
    pub fn new(max_per_call: Option<usize>) -> Self {
        Self {
            descriptor: ModelDescriptor::new(PROVIDER, "embed-small", CapabilityKind::Embedding),
            max_per_call,
            fail_on_call: None,
            cancel_after: None,
            calls: AtomicU32::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, call: u32) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    /// Cancel `ctx` once call number `call` has produced its embeddings
    pub fn cancelling_after(mut self, call: u32, ctx: RequestContext) -> Self {
        self.cancel_after = Some((call, ctx));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Sizes of the sub-batches received, in order
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    fn embed(&self, input: &EmbeddingInput) -> GenerateResult<EmbeddingOutput> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(bad_request());
        }
        self.batches.lock().unwrap().push(input.values.len());
        let embeddings = input
            .values
            .iter()
            .map(|v| vec![v.len() as f32, call as f32])
            .collect();
        if let Some((after, ctx)) = &self.cancel_after {
            if *after == call {
                ctx.cancel();
            }
        }
        Ok(Generation::new(EmbeddingOutput { embeddings })
            .with_usage(Usage {
                input_tokens: Some(input.values.len() as u64),
                output_tokens: None,
                total_tokens: None,
            }))
    }
}

impl Model for MockEmbeddingModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    async fn generate(&self, options: CallOptions<EmbeddingInput>) -> GenerateResult<EmbeddingOutput> {
        let input = options.input.clone();
        CallDriver::new(&self.descriptor)
            .generate(&options, || {
                let result = self.embed(&input);
                async move { result }
            })
            .await
    }

    fn max_values_per_call(&self) -> Option<usize> {
        self.max_per_call
    }
}

/// Text-only provider: knows `gpt-4o` and `gpt-4o-mini`
pub struct MockProvider;

impl Provider for MockProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn capabilities(&self) -> &[CapabilityKind] {
        &[CapabilityKind::Language]
    }

    fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LookupError> {
        match model_id {
            "gpt-4o" | "gpt-4o-mini" => Ok(Arc::new(ScriptedLanguageModel::new(model_id))),
            _ => Err(LookupError::no_such_model(PROVIDER, model_id)),
        }
    }
}
