//! Shared call driver for model implementations
//!
//! Bindings wrap their request/parse code in a [`CallDriver`] call; the driver
//! owns the parts of the contract that must behave identically everywhere:
//! the context pre-check, input validation, retries, diagnostic recording and
//! stream termination.

use super::{CallOptions, GenerateResult, ModelDescriptor};
use crate::diagnostics::ErrorDiagnostic;
use crate::error::CoreError;
use crate::protocol::ValidateInput;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::streaming::{EventPipeline, StreamSink};
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, field, info, info_span, warn, Instrument, Span};

/// Runs one model call on behalf of a vendor implementation
#[derive(Debug, Clone)]
pub struct CallDriver<'a> {
    descriptor: &'a ModelDescriptor,
    default_retry: RetryPolicy,
}

impl<'a> CallDriver<'a> {
    pub fn new(descriptor: &'a ModelDescriptor) -> Self {
        Self {
            descriptor,
            default_retry: RetryPolicy::default(),
        }
    }

    /// Policy used when the call options carry none
    pub fn with_default_retry(mut self, policy: RetryPolicy) -> Self {
        self.default_retry = policy;
        self
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.descriptor
    }

    /// Checks that must pass before any request is built
    pub fn preflight<I: ValidateInput>(&self, options: &CallOptions<I>) -> Result<(), CoreError> {
        if let Some(ctx) = options.context() {
            ctx.check()?;
        }
        validate_headers(&options.headers)?;
        options.input.validate()
    }

    /// Run `operation` under the call's retry policy
    pub async fn execute<I, T, F, Fut>(&self, options: &CallOptions<I>, operation: F) -> Result<T, CoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let policy = options
            .retry_policy
            .clone()
            .unwrap_or_else(|| self.default_retry.clone());
        let result = RetryExecutor::new(policy)
            .execute(options.context(), operation)
            .await;
        if result.attempts > 1 {
            debug!(
                attempts = result.attempts,
                total_delay_ms = result.total_delay.as_millis() as u64,
                "call needed retries"
            );
        }
        result.into_result()
    }

    /// Drive a non-streaming call.
    ///
    /// `operation` performs one attempt (build request, I/O, parse) and is
    /// invoked again for every retry.
    pub async fn generate<I, T, F, Fut>(&self, options: &CallOptions<I>, operation: F) -> GenerateResult<T>
    where
        I: ValidateInput,
        F: FnMut() -> Fut,
        Fut: Future<Output = GenerateResult<T>>,
    {
        let span = self.span(options, "generate");
        async move {
            let outcome = match self.preflight(options) {
                Ok(()) => self.execute(options, operation).await,
                Err(err) => Err(err),
            };
            match &outcome {
                Ok(_) => info!("model call completed"),
                Err(err) => self.record_failure(options, err),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    /// Drive a streaming call.
    ///
    /// `pump` receives the ordering pipeline wrapped around `sink`, pushes
    /// events through it and hands it back with its result. Any failure, and
    /// any stream that ends without a terminal event, is turned into a
    /// terminal `Error` event and recorded.
    pub async fn stream<'s, I, F, Fut>(
        &self,
        options: &CallOptions<I>,
        sink: &'s mut (dyn StreamSink + Send),
        pump: F,
    ) -> Result<(), CoreError>
    where
        I: ValidateInput,
        F: FnOnce(EventPipeline<'s>) -> Fut,
        Fut: Future<Output = (EventPipeline<'s>, Result<(), CoreError>)>,
    {
        let span = self.span(options, "stream");
        async move {
            let pipeline = EventPipeline::new(sink).with_context(options.context.clone());

            let (mut pipeline, result) = match self.preflight(options) {
                Ok(()) => pump(pipeline).await,
                Err(err) => (pipeline, Err(err)),
            };

            let result = result.and_then(|()| match pipeline.failure() {
                Some(diagnostic) => Err(CoreError::ApiCall(diagnostic.clone())),
                None if pipeline.is_closed() => Ok(()),
                None => Err(CoreError::Parse("stream ended without a terminal event".into())),
            });

            match &result {
                Ok(()) => info!(events = pipeline.delivered(), "stream completed"),
                Err(err) => {
                    pipeline.fail(ErrorDiagnostic::from_error(self.descriptor.provider(), err));
                    self.record_failure(options, err);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    fn record_failure<I>(&self, options: &CallOptions<I>, err: &CoreError) {
        warn!(error = %err, retryable = err.is_retryable(), "model call failed");
        options.record_failure(self.descriptor.provider(), err);
    }

    fn span<I>(&self, options: &CallOptions<I>, operation: &'static str) -> Span {
        let span = info_span!(
            "model_call",
            provider = self.descriptor.provider(),
            model = self.descriptor.model_id(),
            capability = %self.descriptor.capability(),
            operation = operation,
            request_id = field::Empty,
        );
        if let Some(ctx) = options.context() {
            span.record("request_id", field::display(ctx.request_id()));
        }
        span
    }
}

/// Reject header names and values that cannot be sent as-is
fn validate_headers(headers: &HashMap<String, String>) -> Result<(), CoreError> {
    for (name, value) in headers {
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
            return Err(CoreError::Validation(format!("invalid header name {:?}", name)));
        }
        if value.contains(['\r', '\n']) {
            return Err(CoreError::Validation(format!(
                "header '{}' contains a line break",
                name
            )));
        }
    }
    Ok(())
}
