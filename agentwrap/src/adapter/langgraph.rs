//! Adapter for compiled LangGraph graphs.
//!
//! The graph is streamed in `messages` and `values` modes. AI message chunks
//! are progress; the last AI message of the final `values` snapshot is the
//! answer. Tool messages and `updates` parts are dropped. The context id is
//! passed through as the graph's thread id.

use super::{
    invoke_outcome, translate_stream, with_timeout, AgentAdapter, AgentInput, BackendStream,
    StreamStep, UniformEvent, UniformEventStream,
};
use crate::config::Framework;
use crate::errors::{AgentError, AgentResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    Messages,
    Updates,
    Values,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Human,
    Ai,
    Tool,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub content: String,
}

/// Graph state as seen in `values` mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphState {
    #[serde(default)]
    pub messages: Vec<GraphMessage>,
}

impl GraphState {
    pub fn last_ai_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.kind == MessageKind::Ai)
            .map(|message| message.content.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GraphStreamPart {
    Messages {
        chunk: GraphMessage,
        node: Option<String>,
    },
    Updates {
        node: String,
        update: serde_json::Value,
    },
    Values(GraphState),
}

#[async_trait]
pub trait CompiledGraph: Send + Sync + 'static {
    /// Runs the graph to its end state.
    async fn invoke(&self, input: &AgentInput) -> AgentResult<GraphState>;

    async fn stream(
        &self,
        input: &AgentInput,
        modes: &[StreamMode],
    ) -> AgentResult<BackendStream<GraphStreamPart>>;
}

const STREAM_MODES: [StreamMode; 2] = [StreamMode::Messages, StreamMode::Values];

fn classify(part: GraphStreamPart) -> StreamStep {
    match part {
        GraphStreamPart::Messages { chunk, .. } if chunk.kind == MessageKind::Ai => {
            StreamStep::Delta(chunk.content)
        }
        GraphStreamPart::Values(state) => state
            .last_ai_message()
            .map_or(StreamStep::Ignore, |answer| {
                StreamStep::Output(answer.to_string())
            }),
        GraphStreamPart::Messages { .. } | GraphStreamPart::Updates { .. } => StreamStep::Ignore,
    }
}

pub struct LangGraphAdapter<G> {
    graph: Arc<G>,
    timeout: Option<Duration>,
}

impl<G: CompiledGraph> LangGraphAdapter<G> {
    pub fn new(graph: G) -> Self {
        Self {
            graph: Arc::new(graph),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<G: CompiledGraph> AgentAdapter for LangGraphAdapter<G> {
    const FRAMEWORK: Framework = Framework::LangGraph;

    async fn invoke(&self, query: &str, context_id: &str) -> UniformEvent {
        let input = AgentInput::from_query(query, context_id);
        let result = with_timeout(self.timeout, self.graph.invoke(&input))
            .await
            .and_then(|state| {
                state
                    .last_ai_message()
                    .map(str::to_string)
                    .ok_or_else(|| AgentError::backend("graph finished without an AI message"))
            });
        invoke_outcome(Self::FRAMEWORK, result)
    }

    fn stream(&self, query: &str, context_id: &str) -> UniformEventStream {
        let graph = Arc::clone(&self.graph);
        let input = AgentInput::from_query(query, context_id);
        translate_stream(
            Self::FRAMEWORK,
            async move { graph.stream(&input, &STREAM_MODES).await },
            classify,
            self.timeout,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::UniformState;
    use crate::test_support::FakeGraph;
    use futures::StreamExt;

    fn message(kind: MessageKind, content: &str) -> GraphMessage {
        GraphMessage {
            kind,
            content: content.to_string(),
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invoke_reads_last_ai_message() {
        let graph = FakeGraph::with_state(GraphState {
            messages: vec![
                message(MessageKind::Human, "Pad Thai recipe step 1"),
                message(MessageKind::Ai, "thinking"),
                message(MessageKind::Tool, "{\"recipe\":\"pad thai\"}"),
                message(MessageKind::Ai, "Step 1: boil noodles"),
            ],
        });
        let adapter = LangGraphAdapter::new(graph);
        assert_eq!(
            adapter.invoke("Pad Thai recipe step 1", "thread-1").await,
            UniformEvent::completed("Step 1: boil noodles")
        );
    }

    #[tokio::test(flavor = "current_thread")]
    async fn state_without_ai_message_is_malformed_output() {
        let graph = FakeGraph::with_state(GraphState {
            messages: vec![message(MessageKind::Human, "hello")],
        });
        let event = LangGraphAdapter::new(graph).invoke("hello", "t").await;
        assert_eq!(event.task_state, UniformState::Failed);
        assert!(event.content.contains("without an AI message"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stream_requests_message_and_value_modes() {
        let graph = FakeGraph::streaming(vec![
            Ok(GraphStreamPart::Messages {
                chunk: message(MessageKind::Tool, "tool output"),
                node: Some("tools".into()),
            }),
            Ok(GraphStreamPart::Messages {
                chunk: message(MessageKind::Ai, "Step 1"),
                node: Some("agent".into()),
            }),
            Ok(GraphStreamPart::Updates {
                node: "agent".into(),
                update: serde_json::json!({"messages": []}),
            }),
            Ok(GraphStreamPart::Values(GraphState {
                messages: vec![message(MessageKind::Ai, "Step 1: boil noodles")],
            })),
        ]);
        let adapter = LangGraphAdapter::new(graph.clone());
        let events: Vec<UniformEvent> = adapter.stream("q", "thread-7").collect().await;

        assert_eq!(
            events,
            vec![
                UniformEvent::working("Step 1"),
                UniformEvent::completed("Step 1: boil noodles"),
            ]
        );
        assert_eq!(graph.requested_modes(), vec![StreamMode::Messages, StreamMode::Values]);
        assert_eq!(graph.inputs()[0].context_id, "thread-7");
    }
}
