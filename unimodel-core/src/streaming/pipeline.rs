//! Ordered event delivery
//!
//! [`EventPipeline`] sits between a vendor binding's stream parser and the
//! caller's sink. It forwards legal events and rejects everything that would
//! break the stream protocol, so a sink never observes an out-of-order stream.
//! Tool input or completion for an id that never started is dropped rather
//! than rejected, so a sloppy upstream cannot abort reconstruction.

use super::event::{StreamEvent, StreamSink};
use crate::context::RequestContext;
use crate::diagnostics::ErrorDiagnostic;
use crate::error::CoreError;
use crate::protocol::ResponseMetadata;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Where a stream is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing delivered yet; only `Start` is accepted
    Pending,
    /// Content events accepted
    Open,
    /// `FinishReason` seen; only `Usage`, `Complete` or `Error` accepted
    Finishing,
    /// Terminal event delivered
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolState {
    Streaming,
    Completed,
}

/// Enforces stream ordering and forwards legal events to a sink
pub struct EventPipeline<'a> {
    sink: &'a mut (dyn StreamSink + Send),
    state: StreamState,
    tools: HashMap<String, ToolState>,
    context: Option<RequestContext>,
    delivered: usize,
    dropped: usize,
    failure: Option<ErrorDiagnostic>,
}

enum Step {
    Deliver(StreamState),
    Drop(String),
}

impl<'a> EventPipeline<'a> {
    pub fn new(sink: &'a mut (dyn StreamSink + Send)) -> Self {
        Self {
            sink,
            state: StreamState::Pending,
            tools: HashMap::new(),
            context: None,
            delivered: 0,
            dropped: 0,
            failure: None,
        }
    }

    /// Attach the call's context so producers can check it between chunks
    pub fn with_context(mut self, context: Option<RequestContext>) -> Self {
        self.context = context;
        self
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    /// Number of events forwarded to the sink
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Number of tool events dropped for referencing an unstarted id
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Diagnostic carried by the terminal `Error` event, if the stream failed
    pub fn failure(&self) -> Option<&ErrorDiagnostic> {
        self.failure.as_ref()
    }

    /// Fail with [`CoreError::Cancelled`] once the call's context is done
    pub fn check_context(&self) -> Result<(), CoreError> {
        match &self.context {
            Some(ctx) => ctx.check(),
            None => Ok(()),
        }
    }

    /// Deliver `event` if it is legal in the current state.
    ///
    /// Illegal events are not forwarded and produce
    /// [`CoreError::Validation`]; the stream state is left unchanged.
    /// Tool events for an id with no prior start are dropped and return `Ok`.
    pub fn emit(&mut self, event: StreamEvent) -> Result<(), CoreError> {
        let next = match self.transition(&event) {
            Ok(Step::Deliver(next)) => next,
            Ok(Step::Drop(reason)) => {
                warn!(event = event.name(), state = ?self.state, "dropping {}", reason);
                self.dropped += 1;
                return Ok(());
            }
            Err(reason) => {
                warn!(event = event.name(), state = ?self.state, "{}", reason);
                return Err(CoreError::Validation(format!(
                    "stream protocol violation: {}",
                    reason
                )));
            }
        };

        match &event {
            StreamEvent::ToolCallStart { id, .. } => {
                self.tools.insert(id.clone(), ToolState::Streaming);
            }
            StreamEvent::ToolCallComplete { id } => {
                self.tools.insert(id.clone(), ToolState::Completed);
            }
            StreamEvent::Error { diagnostic } => {
                self.failure = Some(diagnostic.clone());
            }
            _ => {}
        }

        self.state = next;
        self.delivered += 1;
        self.sink.on_event(event);
        Ok(())
    }

    /// End the stream with an `Error` event unless it is already closed.
    ///
    /// A `Start` is delivered first when nothing has been sent yet. Returns
    /// false when the stream was already closed.
    pub fn fail(&mut self, diagnostic: ErrorDiagnostic) -> bool {
        if self.is_closed() {
            return false;
        }
        if self.state == StreamState::Pending {
            self.forward(StreamEvent::Start {
                metadata: ResponseMetadata::default(),
            });
        }
        self.failure = Some(diagnostic.clone());
        self.state = StreamState::Closed;
        self.forward(StreamEvent::Error { diagnostic });
        true
    }

    fn forward(&mut self, event: StreamEvent) {
        self.delivered += 1;
        self.sink.on_event(event);
    }

    fn transition(&self, event: &StreamEvent) -> Result<Step, String> {
        use StreamState::*;

        let next = match (self.state, event) {
            (Closed, _) => return Err("event after terminal event".into()),

            (Pending, StreamEvent::Start { .. }) => Open,
            (Pending, _) => return Err("stream must begin with start".into()),

            (_, StreamEvent::Start { .. }) => return Err("duplicate start".into()),
            (_, StreamEvent::Error { .. }) => Closed,

            (Open | Finishing, StreamEvent::ToolInputDelta { id, .. })
                if !self.tools.contains_key(id) =>
            {
                return Ok(Step::Drop(format!("input for unknown tool call '{}'", id)));
            }
            (Open | Finishing, StreamEvent::ToolCallComplete { id }) if !self.tools.contains_key(id) => {
                return Ok(Step::Drop(format!("completion for unknown tool call '{}'", id)));
            }

            (Open, StreamEvent::TextDelta { .. }) | (Open, StreamEvent::Usage { .. }) => Open,
            (Open, StreamEvent::ToolCallStart { id, .. }) => match self.tools.get(id) {
                None => Open,
                Some(_) => return Err(format!("tool call '{}' started twice", id)),
            },
            (Open, StreamEvent::ToolInputDelta { id, .. }) => match self.tools.get(id) {
                Some(ToolState::Completed) => {
                    return Err(format!("input for completed tool call '{}'", id))
                }
                _ => Open,
            },
            (Open, StreamEvent::ToolCallComplete { id }) => match self.tools.get(id) {
                Some(ToolState::Completed) => {
                    return Err(format!("tool call '{}' completed twice", id))
                }
                _ => Open,
            },
            (Open, StreamEvent::FinishReason { .. }) => Finishing,
            (Open, StreamEvent::Complete) => return Err("complete without finish_reason".into()),

            (Finishing, StreamEvent::Usage { .. }) => Finishing,
            (Finishing, StreamEvent::Complete) => Closed,
            (Finishing, _) => return Err("only usage or complete may follow finish_reason".into()),
        };
        if next == Closed {
            debug!(delivered = self.delivered, dropped = self.dropped, "stream closed");
        }
        Ok(Step::Deliver(next))
    }
}
