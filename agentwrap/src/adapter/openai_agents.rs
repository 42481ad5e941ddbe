//! Adapter for agents built on the OpenAI Agents runner model.
//!
//! A runner executes an agent definition either to completion (returning the
//! final output) or as a stream of [`RunStreamEvent`]s. Only raw
//! `output_text.delta` response events reach the client as progress; message
//! output items carry the final answer and everything else is discarded.
//!
//! [`ResponsesRunner`] is a runner over the OpenAI Responses API.

use super::{
    invoke_outcome, translate_stream, with_timeout, AgentAdapter, AgentInput, BackendStream,
    StreamStep, UniformEvent, UniformEventStream,
};
use crate::config::{Framework, OpenAiConfig};
use crate::errors::{AgentError, AgentResult};
use crate::models::openai::{http_client, post_json, sse_data};
use async_trait::async_trait;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Raw model response events surfaced while a run streams.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    OutputTextDelta { delta: String },
    Completed,
    Other { event_type: String },
}

/// Semantic items produced by the run loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RunItem {
    MessageOutput { text: String },
    ToolCall { name: String, arguments: String },
    ToolCallOutput { output: String },
    Reasoning,
}

/// Events yielded by a streamed run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStreamEvent {
    RawResponse(ResponseEvent),
    RunItem(RunItem),
    AgentUpdated { agent_name: String },
}

/// Executes one agent definition.
#[async_trait]
pub trait AgentRunner: Send + Sync + 'static {
    /// Runs to completion and returns the final output text.
    async fn run(&self, input: &AgentInput) -> AgentResult<String>;

    async fn run_streamed(&self, input: &AgentInput) -> AgentResult<BackendStream<RunStreamEvent>>;
}

fn classify(event: RunStreamEvent) -> StreamStep {
    match event {
        RunStreamEvent::RawResponse(ResponseEvent::OutputTextDelta { delta }) => {
            StreamStep::Delta(delta)
        }
        RunStreamEvent::RunItem(RunItem::MessageOutput { text }) => StreamStep::Output(text),
        _ => StreamStep::Ignore,
    }
}

pub struct OpenAiAgentsAdapter<R> {
    runner: Arc<R>,
    timeout: Option<Duration>,
}

impl<R: AgentRunner> OpenAiAgentsAdapter<R> {
    pub fn new(runner: R) -> Self {
        Self::from_shared(Arc::new(runner))
    }

    pub fn from_shared(runner: Arc<R>) -> Self {
        Self {
            runner,
            timeout: None,
        }
    }

    /// Bounds a single-shot run, and the wait for each streamed event.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<R: AgentRunner> AgentAdapter for OpenAiAgentsAdapter<R> {
    const FRAMEWORK: Framework = Framework::OpenAi;

    async fn invoke(&self, query: &str, context_id: &str) -> UniformEvent {
        let input = AgentInput::from_query(query, context_id);
        let result = with_timeout(self.timeout, self.runner.run(&input)).await;
        invoke_outcome(Self::FRAMEWORK, result)
    }

    fn stream(&self, query: &str, context_id: &str) -> UniformEventStream {
        let runner = Arc::clone(&self.runner);
        let input = AgentInput::from_query(query, context_id);
        translate_stream(
            Self::FRAMEWORK,
            async move { runner.run_streamed(&input).await },
            classify,
            self.timeout,
        )
    }
}

/// Declarative agent: instructions plus model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model: None,
            temperature: None,
            max_output_tokens: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

/// Runs an [`AgentDefinition`] against the OpenAI Responses API.
///
/// The context id is forwarded as request metadata and not interpreted.
#[derive(Debug, Clone)]
pub struct ResponsesRunner {
    agent: AgentDefinition,
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl ResponsesRunner {
    pub fn new(agent: AgentDefinition, config: OpenAiConfig) -> AgentResult<Self> {
        let client = http_client(&config)?;
        Ok(Self {
            agent,
            config,
            client,
        })
    }

    fn build_payload(&self, input: &AgentInput, stream: bool) -> Value {
        let model = self.agent.model.as_deref().unwrap_or(&self.config.model);
        let mut payload = json!({
            "model": model,
            "instructions": self.agent.instructions,
            "input": input.messages,
            "stream": stream,
            "metadata": { "context_id": input.context_id, "agent": self.agent.name },
        });

        if let Some(temperature) = self.agent.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_output_tokens) = self.agent.max_output_tokens {
            payload["max_output_tokens"] = json!(max_output_tokens);
        }

        payload
    }
}

/// Concatenates the `output_text` parts of every message in a response body.
fn output_text(response_body: &Value) -> Option<String> {
    let texts: Vec<&str> = response_body
        .get("output")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|part| part.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}

fn run_item(item: &Value) -> RunItem {
    match item.get("type").and_then(Value::as_str) {
        Some("message") => RunItem::MessageOutput {
            text: output_text(&json!({ "output": [item] })).unwrap_or_default(),
        },
        Some("function_call") => RunItem::ToolCall {
            name: item["name"].as_str().unwrap_or_default().to_string(),
            arguments: item["arguments"].as_str().unwrap_or_default().to_string(),
        },
        Some("function_call_output") => RunItem::ToolCallOutput {
            output: item["output"].as_str().unwrap_or_default().to_string(),
        },
        _ => RunItem::Reasoning,
    }
}

/// Maps one Responses API stream payload onto a run event.
fn parse_stream_event(data: &str) -> AgentResult<RunStreamEvent> {
    let event: Value = serde_json::from_str(data)?;
    let event_type = event
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match event_type {
        "response.output_text.delta" => Ok(RunStreamEvent::RawResponse(
            ResponseEvent::OutputTextDelta {
                delta: event["delta"].as_str().unwrap_or_default().to_string(),
            },
        )),
        "response.output_item.done" => Ok(RunStreamEvent::RunItem(run_item(&event["item"]))),
        "response.completed" => Ok(RunStreamEvent::RawResponse(ResponseEvent::Completed)),
        "response.failed" | "error" => {
            let message = event
                .pointer("/response/error/message")
                .or_else(|| event.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("response failed");
            Err(AgentError::backend(message))
        }
        other => Ok(RunStreamEvent::RawResponse(ResponseEvent::Other {
            event_type: other.to_string(),
        })),
    }
}

#[async_trait]
impl AgentRunner for ResponsesRunner {
    async fn run(&self, input: &AgentInput) -> AgentResult<String> {
        let payload = self.build_payload(input, false);
        let response = post_json(
            &self.client,
            &self.config,
            "responses",
            &payload,
            Some(self.config.timeout),
        )
        .await?;

        let body: Value = response.json().await?;
        output_text(&body).ok_or_else(|| AgentError::backend("response contained no output text"))
    }

    async fn run_streamed(&self, input: &AgentInput) -> AgentResult<BackendStream<RunStreamEvent>> {
        let payload = self.build_payload(input, true);
        let response = post_json(&self.client, &self.config, "responses", &payload, None).await?;

        Ok(Box::pin(sse_data(response).map(|data| {
            data.and_then(|payload| parse_stream_event(&payload))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{UniformState, INVOKE_ERROR_PREFIX};
    use crate::test_support::FakeRunner;

    #[tokio::test(flavor = "current_thread")]
    async fn invoke_returns_final_output() {
        let adapter = OpenAiAgentsAdapter::new(FakeRunner::answering("Step 1: boil noodles"));
        let event = adapter.invoke("Pad Thai recipe step 1", "ctx-1").await;
        assert_eq!(event, UniformEvent::completed("Step 1: boil noodles"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn invoke_failure_becomes_failed_event() {
        let adapter = OpenAiAgentsAdapter::new(FakeRunner::failing("rate limited"));
        let event = adapter.invoke("q", "ctx").await;
        assert_eq!(event.task_state, UniformState::Failed);
        assert_eq!(event.content, format!("{INVOKE_ERROR_PREFIX}rate limited"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stream_surfaces_only_text_deltas() {
        let runner = FakeRunner::streaming(vec![
            Ok(RunStreamEvent::AgentUpdated {
                agent_name: "Cooking Agent".into(),
            }),
            Ok(RunStreamEvent::RawResponse(ResponseEvent::OutputTextDelta {
                delta: "Step 1".into(),
            })),
            Ok(RunStreamEvent::RunItem(RunItem::ToolCall {
                name: "lookup".into(),
                arguments: "{}".into(),
            })),
            Ok(RunStreamEvent::RawResponse(ResponseEvent::OutputTextDelta {
                delta: String::new(),
            })),
            Ok(RunStreamEvent::RunItem(RunItem::MessageOutput {
                text: "Step 1: boil noodles".into(),
            })),
            Ok(RunStreamEvent::RawResponse(ResponseEvent::Completed)),
        ]);
        let adapter = OpenAiAgentsAdapter::new(runner.clone());

        let events: Vec<UniformEvent> = adapter.stream("q", "ctx-9").collect().await;
        assert_eq!(
            events,
            vec![
                UniformEvent::working("Step 1"),
                UniformEvent::completed("Step 1: boil noodles"),
            ]
        );
        assert_eq!(runner.inputs()[0].context_id, "ctx-9");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn stream_is_lazy_until_polled() {
        let runner = FakeRunner::answering("unused");
        let adapter = OpenAiAgentsAdapter::new(runner.clone());
        let stream = adapter.stream("q", "ctx");
        assert!(runner.inputs().is_empty());
        drop(stream);
        assert!(runner.inputs().is_empty());
    }

    #[test]
    fn payload_forwards_context_and_settings() {
        let runner = ResponsesRunner::new(
            AgentDefinition::new("Cooking Agent", "Explain recipes one step at a time.")
                .with_temperature(0.2)
                .with_max_output_tokens(400),
            OpenAiConfig::new("sk-test").with_model("gpt-4o"),
        )
        .expect("runner");

        let payload = runner.build_payload(&AgentInput::from_query("hi", "ctx-3"), true);
        assert_eq!(payload["model"], json!("gpt-4o"));
        assert_eq!(payload["stream"], json!(true));
        assert_eq!(payload["metadata"]["context_id"], json!("ctx-3"));
        assert_eq!(payload["input"][0], json!({"role": "user", "content": "hi"}));
        assert_eq!(payload["max_output_tokens"], json!(400));
    }

    #[test]
    fn output_text_joins_message_parts() {
        let body = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Step 1: "},
                    {"type": "output_text", "text": "boil noodles"}
                ]}
            ]
        });
        assert_eq!(output_text(&body).as_deref(), Some("Step 1: boil noodles"));
        assert_eq!(output_text(&json!({"output": []})), None);
    }

    #[test]
    fn stream_payloads_map_to_run_events() {
        let delta = parse_stream_event(r#"{"type":"response.output_text.delta","delta":"Hi"}"#)
            .expect("delta");
        assert_eq!(
            delta,
            RunStreamEvent::RawResponse(ResponseEvent::OutputTextDelta { delta: "Hi".into() })
        );

        let item = parse_stream_event(
            r#"{"type":"response.output_item.done","item":{"type":"function_call","name":"search","arguments":"{}"}}"#,
        )
        .expect("item");
        assert!(matches!(item, RunStreamEvent::RunItem(RunItem::ToolCall { name, .. }) if name == "search"));

        let err = parse_stream_event(
            r#"{"type":"response.failed","response":{"error":{"message":"server overloaded"}}}"#,
        )
        .expect_err("failure");
        assert_eq!(err.to_string(), "server overloaded");

        assert!(parse_stream_event("not json").is_err());
    }
}
