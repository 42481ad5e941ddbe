//! Agent invocation adapters.
//!
//! An adapter bridges one agent-execution framework to the uniform event
//! contract consumed by the dispatcher:
//!
//! - [`AgentAdapter::invoke`] runs the agent to completion and always returns
//!   exactly one terminal [`UniformEvent`] (`completed` or `failed`).
//! - [`AgentAdapter::stream`] yields zero or more non-empty `working` deltas
//!   followed by exactly one terminal event. Backend failures become a
//!   synthesized `failed` event; the stream never ends without one.
//!
//! Each framework module defines the capability trait its backend must
//! implement together with that framework's tagged stream items. Which
//! adapter a server uses is decided at build time through generics.

pub mod crewai;
pub mod langgraph;
pub mod openai_agents;

pub use crewai::CrewAiAdapter;
pub use langgraph::LangGraphAdapter;
pub use openai_agents::OpenAiAgentsAdapter;

use crate::config::Framework;
use crate::errors::{AgentError, AgentResult};
use async_stream::stream;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

pub const INVOKE_ERROR_PREFIX: &str = "An error occurred: ";
pub const STREAM_ERROR_PREFIX: &str = "Streaming error: ";

/// States an adapter (or the dispatcher, for `canceled`) can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniformState {
    Working,
    Completed,
    Failed,
    Canceled,
}

impl UniformState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Working)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for UniformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UniformState {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "working" => Ok(Self::Working),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "canceled" => Ok(Self::Canceled),
            other => Err(AgentError::UnknownTaskState(other.to_string())),
        }
    }
}

/// Normalized progress or outcome of an agent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniformEvent {
    pub task_state: UniformState,
    pub content: String,
}

impl UniformEvent {
    pub fn new(task_state: UniformState, content: impl Into<String>) -> Self {
        Self {
            task_state,
            content: content.into(),
        }
    }

    pub fn working(content: impl Into<String>) -> Self {
        Self::new(UniformState::Working, content)
    }

    pub fn completed(content: impl Into<String>) -> Self {
        Self::new(UniformState::Completed, content)
    }

    pub fn failed(content: impl Into<String>) -> Self {
        Self::new(UniformState::Failed, content)
    }

    pub fn canceled(content: impl Into<String>) -> Self {
        Self::new(UniformState::Canceled, content)
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.task_state.is_terminal()
    }
}

/// Lazy, single-consumer sequence of uniform events. Each call to
/// [`AgentAdapter::stream`] starts a fresh backend run when first polled.
pub type UniformEventStream = BoxStream<'static, UniformEvent>;

/// Items produced by a backend's streaming run.
pub type BackendStream<T> = BoxStream<'static, AgentResult<T>>;

#[async_trait]
pub trait AgentAdapter: Send + Sync + 'static {
    /// Framework this adapter drives.
    const FRAMEWORK: Framework;

    /// Runs the agent to completion. Never fails; errors become `failed` events.
    async fn invoke(&self, query: &str, context_id: &str) -> UniformEvent;

    /// Streams incremental output followed by exactly one terminal event.
    fn stream(&self, query: &str, context_id: &str) -> UniformEventStream;
}

/// A conversational turn forwarded to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

/// What a backend receives for one run.
///
/// `context_id` is opaque to the adapters; backends may use it to resume
/// conversational state (a thread id, a session key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInput {
    pub context_id: String,
    pub messages: Vec<InputMessage>,
}

impl AgentInput {
    /// A single user turn carrying `query`.
    pub fn from_query(query: &str, context_id: &str) -> Self {
        Self {
            context_id: context_id.to_string(),
            messages: vec![InputMessage {
                role: "user".to_string(),
                content: query.to_string(),
            }],
        }
    }

    /// Text of the most recent user turn.
    pub fn query(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map_or("", |message| message.content.as_str())
    }
}

/// How an adapter treats one backend stream item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStep {
    /// Incremental answer text; surfaced as `working` when non-empty.
    Delta(String),
    /// The run's final answer; reported by the terminal `completed` event.
    Output(String),
    /// Tool calls, state snapshots, control events.
    Ignore,
}

/// Awaits `future`, failing with [`AgentError::BackendTimeout`] after `timeout`.
pub(crate) async fn with_timeout<T, F>(timeout: Option<Duration>, future: F) -> AgentResult<T>
where
    F: Future<Output = AgentResult<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
            AgentError::BackendTimeout {
                duration_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            }
        })?,
        None => future.await,
    }
}

/// Turns the outcome of a single-shot run into its terminal event.
pub(crate) fn invoke_outcome(framework: Framework, result: AgentResult<String>) -> UniformEvent {
    match result {
        Ok(answer) => UniformEvent::completed(answer),
        Err(err) => {
            tracing::warn!(%framework, error = %err, "agent invocation failed");
            UniformEvent::failed(format!("{INVOKE_ERROR_PREFIX}{err}"))
        }
    }
}

/// Drives a backend stream and enforces the terminal-event guarantee.
///
/// `open` starts the backend run; it is only awaited once the returned stream
/// is first polled. `classify` maps each backend item onto a [`StreamStep`].
/// `idle_timeout` bounds the wait for each backend item.
pub(crate) fn translate_stream<T, O, F>(
    framework: Framework,
    open: O,
    classify: F,
    idle_timeout: Option<Duration>,
) -> UniformEventStream
where
    T: Send + 'static,
    O: Future<Output = AgentResult<BackendStream<T>>> + Send + 'static,
    F: Fn(T) -> StreamStep + Send + 'static,
{
    Box::pin(stream! {
        let mut source = match with_timeout(idle_timeout, open).await {
            Ok(source) => source,
            Err(err) => {
                tracing::warn!(%framework, error = %err, "agent stream failed to start");
                yield UniformEvent::failed(format!("{STREAM_ERROR_PREFIX}{err}"));
                return;
            }
        };

        let mut streamed = String::new();
        let mut output: Option<String> = None;

        loop {
            let next = with_timeout(idle_timeout, async { Ok(source.next().await) }).await;
            let item = match next {
                Ok(Some(Ok(item))) => item,
                Ok(None) => break,
                Ok(Some(Err(err))) | Err(err) => {
                    tracing::warn!(%framework, error = %err, "agent stream failed");
                    yield UniformEvent::failed(format!("{STREAM_ERROR_PREFIX}{err}"));
                    return;
                }
            };

            match classify(item) {
                StreamStep::Delta(delta) if !delta.is_empty() => {
                    streamed.push_str(&delta);
                    yield UniformEvent::working(delta);
                }
                StreamStep::Output(answer) => output = Some(answer),
                StreamStep::Delta(_) | StreamStep::Ignore => {}
            }
        }

        yield UniformEvent::completed(output.unwrap_or(streamed));
    })
}
