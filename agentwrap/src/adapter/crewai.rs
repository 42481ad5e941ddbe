//! Adapter for CrewAI crews.
//!
//! A crew is kicked off with the user's query as input. While streaming it
//! emits chunks tagged with a chunk type; text chunks are progress, tool-call
//! chunks are dropped, and the closing crew output holds the final answer.

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Text,
    ToolCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewChunk {
    pub content: String,
    pub chunk_type: ChunkType,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub agent_role: Option<String>,
}

/// Result of a finished crew run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewOutput {
    pub raw: String,
    #[serde(default)]
    pub json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CrewStreamItem {
    Chunk(CrewChunk),
    Output(CrewOutput),
}

#[async_trait]
pub trait Crew: Send + Sync + 'static {
    async fn kickoff(&self, input: &AgentInput) -> AgentResult<CrewOutput>;

    async fn kickoff_streamed(&self, input: &AgentInput)
        -> AgentResult<BackendStream<CrewStreamItem>>;
}

fn classify(item: CrewStreamItem) -> StreamStep {
    match item {
        CrewStreamItem::Chunk(CrewChunk {
            content,
            chunk_type: ChunkType::Text,
            ..
        }) => StreamStep::Delta(content),
        CrewStreamItem::Chunk(_) => StreamStep::Ignore,
        CrewStreamItem::Output(output) => StreamStep::Output(output.raw),
    }
}

pub struct CrewAiAdapter<C> {
    crew: Arc<C>,
    timeout: Option<Duration>,
}

impl<C: Crew> CrewAiAdapter<C> {
    pub fn new(crew: C) -> Self {
        Self {
            crew: Arc::new(crew),
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
impl<C: Crew> AgentAdapter for CrewAiAdapter<C> {
    const FRAMEWORK: Framework = Framework::CrewAi;

    async fn invoke(&self, query: &str, context_id: &str) -> UniformEvent {
        let input = AgentInput::from_query(query, context_id);
        let result = with_timeout(self.timeout, self.crew.kickoff(&input))
            .await
            .and_then(|output| {
                if output.raw.trim().is_empty() {
                    Err(AgentError::backend("crew finished without output"))
                } else {
                    Ok(output.raw)
                }
            });
        invoke_outcome(Self::FRAMEWORK, result)
    }

    fn stream(&self, query: &str, context_id: &str) -> UniformEventStream {
        let crew = Arc::clone(&self.crew);
        let input = AgentInput::from_query(query, context_id);
        translate_stream(
            Self::FRAMEWORK,
            async move { crew.kickoff_streamed(&input).await },
            classify,
            self.timeout,
        )
    }
}
