//! Request-scoped context for the executor.
//!
//! - [`RequestContext`]: what the transport hands the executor (the client
//!   message, the task it resolved, transport hints).
//! - [`QueryContext`]: the immutable bundle forwarded to an adapter.
//! - [`select_delivery`]: the transport selection policy.

use crate::errors::{AgentError, AgentResult};
use crate::runtime::task_store::Task;
use a2a_types::Message;
use serde::{Deserialize, Serialize};

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Transport hints carried by the inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportHints {
    /// Raw `Accept` header value.
    pub accept: Option<String>,
    /// Raw value of the `stream` query parameter.
    pub stream_param: Option<String>,
}

impl TransportHints {
    pub fn new(accept: Option<String>, stream_param: Option<String>) -> Self {
        Self {
            accept,
            stream_param,
        }
    }

    /// Hints of a client that explicitly asked for an event stream.
    pub fn event_stream() -> Self {
        Self::new(Some(EVENT_STREAM_MIME.to_string()), None)
    }

    /// Whether the client asked for incremental delivery.
    pub fn wants_stream(&self) -> bool {
        let accepts_events = self
            .accept
            .as_deref()
            .is_some_and(|accept| accept.contains(EVENT_STREAM_MIME));
        let opted_in = self
            .stream_param
            .as_deref()
            .is_some_and(|flag| flag.eq_ignore_ascii_case("true"));
        accepts_events || opted_in
    }
}

/// How results are delivered for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    SingleShot,
    Streaming,
}

/// Chooses the streaming path only when the capability is enabled and the
/// client asked for it; a disabled capability always means single-shot.
#[must_use]
pub fn select_delivery(streaming_capability: bool, hints: &TransportHints) -> DeliveryMode {
    if streaming_capability && hints.wants_stream() {
        DeliveryMode::Streaming
    } else {
        DeliveryMode::SingleShot
    }
}

/// Everything the executor knows about an inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub message: Message,
    /// The task this request continues, if any.
    pub current_task: Option<Task>,
    pub transport: TransportHints,
}

impl RequestContext {
    pub fn new(message: Message) -> Self {
        Self {
            message,
            current_task: None,
            transport: TransportHints::default(),
        }
    }

    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.current_task = Some(task);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportHints) -> Self {
        self.transport = transport;
        self
    }

    /// Text of the client message with surrounding whitespace removed.
    pub fn user_input(&self) -> String {
        self.message.text_content().trim().to_string()
    }

    /// The context identifier to run under: the current task's, then the
    /// message's, else `None` so the caller can mint one.
    pub fn context_id(&self) -> Option<String> {
        self.current_task
            .as_ref()
            .map(|task| task.context_id.clone())
            .or_else(|| self.message.context_id.clone())
    }
}

/// Input bundle handed to an adapter. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub query: String,
    pub context_id: String,
    pub streaming_requested: bool,
}

impl QueryContext {
    /// Builds the bundle for a run under `context_id`, rejecting an empty query.
    pub fn from_request(request: &RequestContext, context_id: &str) -> AgentResult<Self> {
        let query = request.user_input();
        if query.is_empty() {
            return Err(AgentError::InvalidInput(
                "message must contain non-empty text".to_string(),
            ));
        }

        Ok(Self {
            query,
            context_id: context_id.to_string(),
            streaming_requested: request.transport.wants_stream(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_types::MessageRole;

    fn hints(accept: Option<&str>, stream: Option<&str>) -> TransportHints {
        TransportHints::new(accept.map(str::to_string), stream.map(str::to_string))
    }

    #[test]
    fn disabled_capability_never_streams() {
        assert_eq!(
            select_delivery(false, &hints(None, Some("true"))),
            DeliveryMode::SingleShot
        );
        assert_eq!(
            select_delivery(false, &hints(Some("text/event-stream"), None)),
            DeliveryMode::SingleShot
        );
    }

    #[test]
    fn enabled_capability_streams_on_either_hint() {
        assert_eq!(
            select_delivery(true, &hints(Some("application/json, text/event-stream"), None)),
            DeliveryMode::Streaming
        );
        assert_eq!(
            select_delivery(true, &hints(None, Some("TRUE"))),
            DeliveryMode::Streaming
        );
        assert_eq!(
            select_delivery(true, &hints(Some("application/json"), Some("false"))),
            DeliveryMode::SingleShot
        );
        assert_eq!(select_delivery(true, &hints(None, None)), DeliveryMode::SingleShot);
    }

    #[test]
    fn blank_query_is_rejected() {
        let request = RequestContext::new(Message::text("m", MessageRole::User, "   "));
        let err = QueryContext::from_request(&request, "c").unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[test]
    fn context_prefers_current_task() {
        let message = Message::text("m", MessageRole::User, "hi").with_context_id("from-message");
        let request = RequestContext::new(message.clone());
        assert_eq!(request.context_id().as_deref(), Some("from-message"));

        let request = RequestContext::new(message).with_task(Task::new("t", "from-task"));
        assert_eq!(request.context_id().as_deref(), Some("from-task"));
    }
}
