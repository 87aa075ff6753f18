//! Streaming event protocol, ordering pipeline and accumulator
//!
//! Delivery is synchronous and strictly ordered: a vendor binding parses its
//! wire stream, pushes events through an [`EventPipeline`], and the pipeline
//! hands each legal event to the caller's [`StreamSink`] on the same task.

mod accumulator;
mod event;
mod pipeline;

pub use accumulator::{AccumulatingSink, Accumulator, ToolCallRecord};
pub use event::{CollectingSink, StreamEvent, StreamSink};
pub use pipeline::{EventPipeline, StreamState};

use crate::error::CoreError;
use crate::model::Generation;
use crate::protocol::{FinishReason, LanguageOutput, Usage};

/// Emit a complete generation as a legal event sequence.
///
/// Used to serve `stream` from models that only generate whole responses.
pub fn replay_generation(
    pipeline: &mut EventPipeline<'_>,
    generation: Generation<LanguageOutput>,
) -> Result<(), CoreError> {
    let Generation {
        content,
        usage,
        response,
        ..
    } = generation;

    pipeline.emit(StreamEvent::Start { metadata: response })?;
    if !content.text.is_empty() {
        pipeline.emit(StreamEvent::TextDelta { delta: content.text })?;
    }
    for call in content.tool_calls {
        pipeline.emit(StreamEvent::tool_start(call.id.clone(), call.name))?;
        if !call.input.is_empty() {
            pipeline.emit(StreamEvent::tool_input(call.id.clone(), call.input))?;
        }
        pipeline.emit(StreamEvent::tool_complete(call.id))?;
    }
    if usage != Usage::default() {
        pipeline.emit(StreamEvent::Usage { usage })?;
    }
    pipeline.emit(StreamEvent::FinishReason {
        reason: content.finish_reason.unwrap_or(FinishReason::Unknown),
    })?;
    pipeline.emit(StreamEvent::Complete)
}
