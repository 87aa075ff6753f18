//! Online reconstruction of a complete response from stream events

use super::event::{StreamEvent, StreamSink};
use crate::diagnostics::ErrorDiagnostic;
use crate::error::CoreError;
use crate::model::Generation;
use crate::protocol::{FinishReason, LanguageOutput, ResponseMetadata, ToolCall, Usage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Accumulated state of one tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    /// Concatenated input deltas, in arrival order
    pub input: String,
    pub completed: bool,
}

/// Single-pass reconstruction of text, tool calls, usage and finish state.
///
/// State only grows: text is appended, tool calls are added once and their
/// input is appended. Replaying the same events into a fresh accumulator
/// always produces the same result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accumulator {
    text: String,
    tool_calls: Vec<ToolCallRecord>,
    index: HashMap<String, usize>,
    usage: Option<Usage>,
    finish_reason: Option<FinishReason>,
    metadata: ResponseMetadata,
    error: Option<ErrorDiagnostic>,
    completed: bool,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a fresh accumulator from a recorded event sequence
    pub fn replay<'e>(events: impl IntoIterator<Item = &'e StreamEvent>) -> Self {
        let mut acc = Self::new();
        for event in events {
            acc.apply(event);
        }
        acc
    }

    /// Fold one event into the accumulated state
    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Start { metadata } => self.metadata = metadata.clone(),
            StreamEvent::TextDelta { delta } => self.append_text(delta),
            StreamEvent::ToolCallStart { id, name } => {
                self.start_tool_call(id, name);
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                self.append_tool_input(id, delta);
            }
            StreamEvent::ToolCallComplete { id } => {
                self.complete_tool_call(id);
            }
            StreamEvent::Usage { usage } => match &mut self.usage {
                Some(current) => current.merge(usage),
                None => self.usage = Some(*usage),
            },
            StreamEvent::FinishReason { reason } => self.finish_reason = Some(reason.clone()),
            StreamEvent::Error { diagnostic } => self.error = Some(diagnostic.clone()),
            StreamEvent::Complete => self.completed = true,
        }
    }

    pub fn append_text(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Register a tool call. Returns false (and changes nothing) if the id
    /// is already known.
    pub fn start_tool_call(&mut self, id: &str, name: &str) -> bool {
        if self.index.contains_key(id) {
            return false;
        }
        self.index.insert(id.to_string(), self.tool_calls.len());
        self.tool_calls.push(ToolCallRecord {
            id: id.to_string(),
            name: name.to_string(),
            input: String::new(),
            completed: false,
        });
        true
    }

    /// Append input to a started tool call; a no-op for unknown ids
    pub fn append_tool_input(&mut self, id: &str, delta: &str) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.tool_calls[i].input.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Mark a started tool call complete; a no-op for unknown ids
    pub fn complete_tool_call(&mut self, id: &str) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.tool_calls[i].completed = true;
                true
            }
            None => false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tool calls in the order they were started
    pub fn tool_calls(&self) -> &[ToolCallRecord] {
        &self.tool_calls
    }

    pub fn tool_call(&self, id: &str) -> Option<&ToolCallRecord> {
        self.index.get(id).map(|&i| &self.tool_calls[i])
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    pub fn finish_reason(&self) -> Option<&FinishReason> {
        self.finish_reason.as_ref()
    }

    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    pub fn error(&self) -> Option<&ErrorDiagnostic> {
        self.error.as_ref()
    }

    /// True once `Complete` has been applied
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Language output built from the accumulated state
    pub fn to_output(&self) -> LanguageOutput {
        LanguageOutput {
            text: self.text.clone(),
            tool_calls: self
                .tool_calls
                .iter()
                .map(|record| ToolCall {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    input: record.input.clone(),
                })
                .collect(),
            finish_reason: self.finish_reason.clone(),
        }
    }

    /// Convert a finished stream into a generate-style result.
    ///
    /// A stream that ended with `Error` becomes the classified failure; a
    /// stream that never completed is a parse failure.
    pub fn into_generation(self) -> Result<Generation<LanguageOutput>, CoreError> {
        if let Some(diagnostic) = self.error {
            return Err(CoreError::ApiCall(diagnostic));
        }
        if !self.completed {
            return Err(CoreError::Parse("stream ended before complete".into()));
        }
        let content = self.to_output();
        Ok(Generation {
            content,
            usage: self.usage.unwrap_or_default(),
            warnings: Vec::new(),
            response: self.metadata,
        })
    }
}

/// Sink that folds every event into an [`Accumulator`] before forwarding it
#[derive(Debug, Default)]
pub struct AccumulatingSink<S> {
    accumulator: Accumulator,
    inner: S,
}

impl<S: StreamSink> AccumulatingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            accumulator: Accumulator::new(),
            inner,
        }
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub fn into_parts(self) -> (Accumulator, S) {
        (self.accumulator, self.inner)
    }
}

impl<S: StreamSink> StreamSink for AccumulatingSink<S> {
    fn on_event(&mut self, event: StreamEvent) {
        self.accumulator.apply(&event);
        self.inner.on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<StreamEvent> {
        vec![
            StreamEvent::Start {
                metadata: ResponseMetadata {
                    id: Some("resp_1".into()),
                    ..Default::default()
                },
            },
            StreamEvent::text("The weather "),
            StreamEvent::tool_start("call_a", "get_weather"),
            StreamEvent::tool_input("call_a", "{\"city\":"),
            StreamEvent::text("is "),
            StreamEvent::tool_start("call_b", "get_time"),
            StreamEvent::tool_input("call_b", "{}"),
            StreamEvent::tool_input("call_a", "\"Oslo\"}"),
            StreamEvent::tool_complete("call_a"),
            StreamEvent::text("mild."),
            StreamEvent::FinishReason {
                reason: FinishReason::ToolCalls,
            },
            StreamEvent::Usage {
                usage: Usage::new(12, 30),
            },
            StreamEvent::Complete,
        ]
    }

    #[test]
    fn test_reconstruction() {
        let acc = Accumulator::replay(&sample());
        assert_eq!(acc.text(), "The weather is mild.");
        assert_eq!(acc.tool_calls().len(), 2);
        assert_eq!(acc.tool_calls()[0].id, "call_a");
        assert_eq!(acc.tool_calls()[0].input, "{\"city\":\"Oslo\"}");
        assert!(acc.tool_calls()[0].completed);
        assert!(!acc.tool_call("call_b").unwrap().completed);
        assert_eq!(acc.finish_reason(), Some(&FinishReason::ToolCalls));
        assert_eq!(acc.usage(), Some(Usage::new(12, 30)));
        assert_eq!(acc.metadata().id.as_deref(), Some("resp_1"));
        assert!(acc.is_complete());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let events = sample();
        let first = Accumulator::replay(&events);
        let second = Accumulator::replay(&events);
        assert_eq!(first, second);
        assert_eq!(first.to_output(), second.to_output());
    }

    #[test]
    fn test_input_for_unstarted_id_is_noop() {
        let mut acc = Accumulator::new();
        acc.start_tool_call("known", "f");
        assert!(!acc.append_tool_input("ghost", "{}"));
        assert!(!acc.complete_tool_call("ghost"));
        assert_eq!(acc.tool_calls().len(), 1);
        assert!(acc.tool_call("ghost").is_none());
    }

    #[test]
    fn test_restart_does_not_reset() {
        let mut acc = Accumulator::new();
        acc.start_tool_call("c", "first");
        acc.append_tool_input("c", "abc");
        assert!(!acc.start_tool_call("c", "second"));
        assert_eq!(acc.tool_call("c").unwrap().name, "first");
        assert_eq!(acc.tool_call("c").unwrap().input, "abc");
    }

    #[test]
    fn test_into_generation() {
        let generation = Accumulator::replay(&sample()).into_generation().unwrap();
        assert_eq!(generation.content.text, "The weather is mild.");
        assert_eq!(generation.content.tool_calls.len(), 2);
        assert_eq!(generation.usage.output_tokens, Some(30));

        let mut failed = sample();
        failed.truncate(3);
        failed.push(StreamEvent::Error {
            diagnostic: ErrorDiagnostic::network("openai", "connection reset"),
        });
        let err = Accumulator::replay(&failed).into_generation().unwrap_err();
        assert!(err.is_retryable());

        let mut unfinished = sample();
        unfinished.pop();
        assert!(matches!(
            Accumulator::replay(&unfinished).into_generation(),
            Err(CoreError::Parse(_))
        ));
    }

    #[test]
    fn test_accumulating_sink_forwards() {
        let mut sink = AccumulatingSink::new(crate::streaming::CollectingSink::new());
        for event in sample() {
            sink.on_event(event);
        }
        let (acc, inner) = sink.into_parts();
        assert_eq!(inner.events.len(), sample().len());
        assert_eq!(acc, Accumulator::replay(&sample()));
    }
}
