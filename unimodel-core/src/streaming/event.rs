//! Stream event protocol

use crate::diagnostics::ErrorDiagnostic;
use crate::protocol::{FinishReason, ResponseMetadata, Usage};
use serde::{Deserialize, Serialize};

/// One event of a streamed language model response.
///
/// A legal stream is `Start`, then any number of content events, then exactly
/// one terminal: `Error`, or `FinishReason` followed by `Complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start {
        #[serde(default)]
        metadata: ResponseMetadata,
    },
    TextDelta {
        delta: String,
    },
    ToolCallStart {
        id: String,
        name: String,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    ToolCallComplete {
        id: String,
    },
    Usage {
        usage: Usage,
    },
    FinishReason {
        reason: FinishReason,
    },
    Error {
        diagnostic: ErrorDiagnostic,
    },
    Complete,
}

impl StreamEvent {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            delta: delta.into(),
        }
    }

    pub fn tool_start(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ToolCallStart {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn tool_input(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ToolInputDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    pub fn tool_complete(id: impl Into<String>) -> Self {
        Self::ToolCallComplete { id: id.into() }
    }

    /// `Error` and `Complete` end a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Complete)
    }

    /// Tool-call id referenced by this event, if any
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCallStart { id, .. }
            | Self::ToolInputDelta { id, .. }
            | Self::ToolCallComplete { id } => Some(id),
            _ => None,
        }
    }

    /// Event name as used on the wire and in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::TextDelta { .. } => "text_delta",
            Self::ToolCallStart { .. } => "tool_call_start",
            Self::ToolInputDelta { .. } => "tool_input_delta",
            Self::ToolCallComplete { .. } => "tool_call_complete",
            Self::Usage { .. } => "usage",
            Self::FinishReason { .. } => "finish_reason",
            Self::Error { .. } => "error",
            Self::Complete => "complete",
        }
    }
}

/// Receives stream events synchronously, in order, on the pumping task
pub trait StreamSink {
    fn on_event(&mut self, event: StreamEvent);
}

impl<F> StreamSink for F
where
    F: FnMut(StreamEvent),
{
    fn on_event(&mut self, event: StreamEvent) {
        self(event)
    }
}

/// Sink that keeps every event it receives
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectingSink {
    pub events: Vec<StreamEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_events(self) -> Vec<StreamEvent> {
        self.events
    }
}

impl StreamSink for CollectingSink {
    fn on_event(&mut self, event: StreamEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(StreamEvent::tool_input("call_1", "{\"a\"")).unwrap();
        assert_eq!(json["type"], "tool_input_delta");
        assert_eq!(json["id"], "call_1");
        assert_eq!(StreamEvent::Complete.name(), "complete");
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::Complete.is_terminal());
        assert!(!StreamEvent::FinishReason {
            reason: FinishReason::Stop
        }
        .is_terminal());
        assert!(!StreamEvent::text("hi").is_terminal());
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |event: StreamEvent| seen.push(event.name());
            sink.on_event(StreamEvent::text("a"));
            sink.on_event(StreamEvent::Complete);
        }
        assert_eq!(seen, vec!["text_delta", "complete"]);
    }
}
