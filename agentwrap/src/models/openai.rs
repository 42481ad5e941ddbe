//! `OpenAI` HTTP plumbing shared by the chat client and the Responses runner.
//!
//! API Documentation: <https://platform.openai.com/docs/api-reference/chat>

use super::{ChatRequest, CompletionClient};
use crate::config::OpenAiConfig;
use crate::errors::{AgentError, AgentResult};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::{BoxStream, TryStreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

pub(crate) const PROVIDER: &str = "OpenAI";

/// Builds the process-wide HTTP client for `config`.
pub(crate) fn http_client(config: &OpenAiConfig) -> AgentResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(config.timeout)
        .build()
        .map_err(AgentError::from)
}

/// POSTs `payload` to `path` and maps non-2xx statuses onto provider errors.
pub(crate) async fn post_json(
    client: &reqwest::Client,
    config: &OpenAiConfig,
    path: &str,
    payload: &Value,
    timeout: Option<Duration>,
) -> AgentResult<reqwest::Response> {
    let mut request = client
        .post(config.endpoint(path))
        .bearer_auth(&config.api_key)
        .json(payload);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(match status.as_u16() {
        401 | 403 => AgentError::LlmAuthentication {
            provider: PROVIDER.to_string(),
        },
        429 => AgentError::LlmRateLimit {
            provider: PROVIDER.to_string(),
        },
        _ => AgentError::LlmProvider {
            provider: PROVIDER.to_string(),
            message: format!("HTTP {status}: {error_body}"),
        },
    })
}

/// Yields the `data:` payloads of a server-sent event response until `[DONE]`.
pub(crate) fn sse_data(response: reqwest::Response) -> BoxStream<'static, AgentResult<String>> {
    let bytes = response.bytes_stream().map_err(std::io::Error::other);
    let mut reader = StreamReader::new(Box::pin(bytes));

    Box::pin(try_stream! {
        let mut line = String::new();
        loop {
            line.clear();
            let read = reader.read_line(&mut line).await.map_err(|err| AgentError::Network {
                operation: "sse_read".to_string(),
                reason: err.to_string(),
            })?;
            if read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(':') {
                continue;
            }
            if let Some(data) = trimmed.strip_prefix("data:") {
                let data = data.trim_start();
                if data == "[DONE]" {
                    break;
                }
                yield data.to_string();
            }
        }
    })
}

/// Chat completions client. One instance per process, shared by the tools.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiChatClient {
    pub fn new(config: OpenAiConfig) -> AgentResult<Self> {
        let client = http_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn build_payload(&self, request: &ChatRequest) -> Value {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let mut payload = json!({
            "model": model,
            "messages": request.messages,
        });

        if let Some(temperature) = request.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }

        payload
    }

    fn parse_response(response_body: &Value) -> AgentResult<String> {
        let message = response_body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| AgentError::LlmProvider {
                provider: PROVIDER.to_string(),
                message: "Missing 'choices[0].message' in response".to_string(),
            })?;

        Ok(message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> AgentResult<String> {
        let payload = self.build_payload(&request);
        let response = post_json(
            &self.client,
            &self.config,
            "chat/completions",
            &payload,
            Some(self.config.timeout),
        )
        .await?;

        let body: Value = response.json().await?;
        Self::parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiChatClient {
        OpenAiChatClient::new(OpenAiConfig::new("sk-test").with_model("gpt-default"))
            .expect("client")
    }

    #[test]
    fn payload_uses_request_overrides() {
        let request = ChatRequest::new()
            .system("You extract internship process details into JSON.")
            .user("post body")
            .with_model("gpt-4o-mini")
            .with_temperature(0.0)
            .with_max_tokens(1500);

        let payload = client().build_payload(&request);
        assert_eq!(payload["model"], json!("gpt-4o-mini"));
        assert_eq!(payload["temperature"], json!(0.0));
        assert_eq!(payload["max_tokens"], json!(1500));
        assert_eq!(payload["messages"][0]["role"], json!("system"));
        assert_eq!(payload["messages"][1]["content"], json!("post body"));
    }

    #[test]
    fn payload_falls_back_to_configured_model() {
        let payload = client().build_payload(&ChatRequest::new().user("hi"));
        assert_eq!(payload["model"], json!("gpt-default"));
        assert!(payload.get("temperature").is_none());
    }

    #[test]
    fn parse_response_trims_content() {
        let body = json!({"choices": [{"message": {"content": "  [\"a\"]\n"}}]});
        assert_eq!(OpenAiChatClient::parse_response(&body).unwrap(), "[\"a\"]");
    }

    #[test]
    fn parse_response_without_choices_is_provider_error() {
        let err = OpenAiChatClient::parse_response(&json!({})).expect_err("no choices");
        match err {
            AgentError::LlmProvider { provider, .. } => assert_eq!(provider, PROVIDER),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
