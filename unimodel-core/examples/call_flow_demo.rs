//! Call flow demo
//!
//! Wires an in-process echo provider into a registry and walks through a
//! plain call, a streamed call, a retried call and a cancelled call.
//!
//! Run with: RUST_LOG=unimodel_core=debug cargo run --example call_flow_demo

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use unimodel_core::diagnostics::ErrorDiagnostic;
use unimodel_core::model::{
    CallOptions, CapabilityKind, DiagnosticSink, GenerateResult, Generation, LanguageModel, Model,
    ModelDescriptor,
};
use unimodel_core::protocol::{FinishReason, LanguageInput, LanguageOutput, MessageRole, Usage};
use unimodel_core::registry::{LookupError, Provider};
use unimodel_core::streaming::{AccumulatingSink, StreamEvent};
use unimodel_core::{CoreConfig, RequestContext, RetryPolicy};

/// Echoes the last user message; every third attempt reports a 503
struct EchoModel {
    descriptor: ModelDescriptor,
    config: CoreConfig,
    attempts: AtomicU32,
}

impl Model for EchoModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
}

impl EchoModel {
    fn attempt(&self, input: &LanguageInput) -> GenerateResult<LanguageOutput> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if n % 3 == 1 {
            return Err(ErrorDiagnostic::from_status(
                self.provider(),
                503,
                Some(r#"{"error":{"message":"overloaded, key sk-demo123 throttled"}}"#),
            )
            .into());
        }
        let text = input
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| format!("echo: {}", m.content))
            .unwrap_or_default();
        let usage = Usage::new(input.messages.len() as u64, text.len() as u64);
        Ok(Generation::new(LanguageOutput {
            text,
            tool_calls: Vec::new(),
            finish_reason: Some(FinishReason::Stop),
        })
        .with_usage(usage))
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    async fn generate(&self, options: CallOptions<LanguageInput>) -> GenerateResult<LanguageOutput> {
        let input = options.input.clone();
        self.config
            .call_driver(&self.descriptor)
            .generate(&options, || {
                let result = self.attempt(&input);
                async move { result }
            })
            .await
    }
}

struct EchoProvider {
    config: CoreConfig,
}

impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn capabilities(&self) -> &[CapabilityKind] {
        &[CapabilityKind::Language]
    }

    fn language_model(&self, model_id: &str) -> Result<Arc<dyn LanguageModel>, LookupError> {
        Ok(Arc::new(EchoModel {
            descriptor: ModelDescriptor::new(self.name(), model_id, CapabilityKind::Language),
            config: self.config.clone(),
            attempts: AtomicU32::new(0),
        }))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = CoreConfig::from_yaml_str(
        "retry:\n  max_retries: 2\n  initial_delay_ms: 20\ndefault_timeout_ms: 5000\n",
    )?;
    let registry = config
        .registry()
        .with_provider(Arc::new(EchoProvider { config: config.clone() }));
    println!("Providers: {:?}", registry.provider_names());

    let model = registry.language_model("echo:echo-1")?;
    println!("Resolved {}", model.descriptor());

    // First attempt fails with a retryable 503; the driver retries it.
    let generation = model
        .generate(CallOptions::new(LanguageInput::prompt("hello")).with_context(config.request_context()))
        .await?;
    println!("generate -> {:?} ({:?} tokens)", generation.content.text, generation.usage.total());

    let mut sink = AccumulatingSink::new(|event: StreamEvent| println!("  event: {}", event.name()));
    model
        .stream(CallOptions::new(LanguageInput::prompt("stream me")), &mut sink)
        .await?;
    let (accumulated, _) = sink.into_parts();
    println!("stream -> {:?}", accumulated.text());

    let diagnostics = DiagnosticSink::new();
    let failing = model
        .generate(
            CallOptions::new(LanguageInput::prompt("no retries"))
                .with_retry_policy(RetryPolicy::no_retry())
                .with_diagnostic(diagnostics.clone()),
        )
        .await;
    if let (Err(err), Some(diagnostic)) = (failing, diagnostics.get()) {
        println!("no_retry -> {} | recorded: {}", err, diagnostic);
    }

    let ctx = RequestContext::new();
    ctx.cancel();
    let cancelled = model
        .generate(CallOptions::new(LanguageInput::prompt("too late")).with_context(ctx))
        .await;
    println!("cancelled -> {:?}", cancelled.err());

    Ok(())
}
