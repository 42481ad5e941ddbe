//! Credentials and endpoints for the remote services the tools and backends call.

use super::env_resolver::{EnvKey, EnvResolverFn};
use crate::errors::{AgentError, AgentResult};
use std::time::Duration;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// OpenAI connection settings, created once per process and shared.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Reads `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL` (optional).
    pub fn from_env() -> AgentResult<Self> {
        Self::from_resolver(None)
    }

    pub fn from_resolver(resolver: Option<&EnvResolverFn>) -> AgentResult<Self> {
        let api_key = EnvKey::new(OPENAI_API_KEY_ENV).resolve_with(resolver)?;
        if api_key.trim().is_empty() {
            return Err(AgentError::InvalidConfiguration {
                field: OPENAI_API_KEY_ENV.to_string(),
                reason: "API key must not be empty".to_string(),
            });
        }

        let mut config = Self::new(api_key);
        if let Some(base_url) = EnvKey::new(OPENAI_BASE_URL_ENV).resolve_optional(resolver) {
            config.base_url = base_url;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Joins `path` onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

pub const REDDIT_CLIENT_ID_ENV: &str = "REDDIT_CLIENT_ID";
pub const REDDIT_CLIENT_SECRET_ENV: &str = "REDDIT_CLIENT_SECRET";
pub const REDDIT_USER_AGENT_ENV: &str = "REDDIT_USER_AGENT";
pub const DEFAULT_REDDIT_USER_AGENT: &str = "agentwrap-post-search/0.1";

/// Reddit app credentials for application-only OAuth.
#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl RedditConfig {
    pub fn from_env() -> AgentResult<Self> {
        Self::from_resolver(None)
    }

    pub fn from_resolver(resolver: Option<&EnvResolverFn>) -> AgentResult<Self> {
        Ok(Self {
            client_id: EnvKey::new(REDDIT_CLIENT_ID_ENV).resolve_with(resolver)?,
            client_secret: EnvKey::new(REDDIT_CLIENT_SECRET_ENV).resolve_with(resolver)?,
            user_agent: EnvKey::new(REDDIT_USER_AGENT_ENV)
                .resolve_optional(resolver)
                .unwrap_or_else(|| DEFAULT_REDDIT_USER_AGENT.to_string()),
        })
    }
}
