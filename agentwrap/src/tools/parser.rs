//! LLM extraction of internship process details from Reddit posts.

use crate::config::DEFAULT_OPENAI_MODEL;
use crate::errors::AgentResult;
use crate::models::{ChatRequest, CompletionClient};
use crate::tools::pool::BoundedPool;
use crate::tools::post_search::RedditPost;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const PARSER_SYSTEM_PROMPT: &str = "You extract internship process details into JSON.";
const PARSER_TEMPERATURE: f32 = 0.0;
const PARSER_MAX_TOKENS: u32 = 1500;

/// Structured record extracted from one post.
///
/// Records that could not be parsed carry `parsing_error`, and `raw_response`
/// when the model answered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedPost {
    pub post_id: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Interview stages in order.
    #[serde(default)]
    pub steps: Vec<String>,
    /// Milestone name -> `YYYY-MM-DD`.
    #[serde(default)]
    pub timeline: BTreeMap<String, String>,
    #[serde(default)]
    pub additional_notes: Option<String>,
    #[serde(default)]
    pub original_title: Option<String>,
    #[serde(default)]
    pub original_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsing_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl ParsedPost {
    /// Record kept when the model output is not a valid record.
    pub fn fallback(post: &RedditPost, error: impl Into<String>, raw_response: &str) -> Self {
        Self {
            post_id: post.post_id.clone(),
            author: post.author.clone(),
            created_utc: Some(post.created_utc),
            subreddit: Some(post.subreddit.clone()),
            url: Some(post.url.clone()),
            original_title: Some(post.title.clone()),
            original_body: Some(post.body.clone()),
            parsing_error: Some(error.into()),
            raw_response: Some(raw_response.to_string()),
            ..Self::default()
        }
    }

    /// Record kept when the worker for a post failed outright.
    pub fn worker_failure(post_id: &str, error: impl std::fmt::Display) -> Self {
        Self {
            post_id: post_id.to_string(),
            parsing_error: Some(format!("thread error: {error}")),
            ..Self::default()
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.parsing_error.is_some()
    }
}

/// Parses batches of posts with a bounded pool of concurrent completions.
pub struct PostParser<C> {
    client: Arc<C>,
    model: String,
}

impl<C: CompletionClient + 'static> PostParser<C> {
    pub fn new(client: C) -> Self {
        Self::from_shared(Arc::new(client))
    }

    pub fn from_shared(client: Arc<C>) -> Self {
        Self {
            client,
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Parses every post; one record per post, in input order.
    ///
    /// Failures stay with their post: bad model output becomes a
    /// [`ParsedPost::fallback`], a failed call or crashed worker a
    /// [`ParsedPost::worker_failure`].
    pub async fn parse_posts(&self, posts: Vec<RedditPost>) -> Vec<ParsedPost> {
        let post_ids: Vec<String> = posts.iter().map(|post| post.post_id.clone()).collect();
        let pool = BoundedPool::for_items(posts.len());
        tracing::debug!(posts = posts.len(), workers = pool.workers(), "parsing posts");

        let results = pool
            .map(posts, |post| {
                let client = Arc::clone(&self.client);
                let model = self.model.clone();
                async move { parse_one(client.as_ref(), &model, &post).await }
            })
            .await;

        results
            .into_iter()
            .zip(post_ids)
            .map(|(result, post_id)| match result {
                Ok(Ok(record)) => record,
                Ok(Err(err)) | Err(err) => {
                    tracing::warn!(%post_id, error = %err, "post parsing worker failed");
                    ParsedPost::worker_failure(&post_id, err)
                }
            })
            .collect()
    }
}

async fn parse_one<C: CompletionClient + ?Sized>(
    client: &C,
    model: &str,
    post: &RedditPost,
) -> AgentResult<ParsedPost> {
    let request = ChatRequest::new()
        .with_model(model)
        .system(PARSER_SYSTEM_PROMPT)
        .user(extraction_prompt(post))
        .with_temperature(PARSER_TEMPERATURE)
        .with_max_tokens(PARSER_MAX_TOKENS);

    let content = client.complete(request).await?;
    let content = content.trim();

    match serde_json::from_str::<ParsedPost>(strip_code_fence(content)) {
        Ok(record) => Ok(record),
        Err(err) => {
            tracing::warn!(post_id = %post.post_id, error = %err, "model output is not a valid record");
            Ok(ParsedPost::fallback(post, err.to_string(), content))
        }
    }
}

fn extraction_prompt(post: &RedditPost) -> String {
    format!(
        r#"Extract structured internship process data from the following Reddit post.

Required fields (output exactly as valid JSON):
- post_id
- author
- created_utc
- subreddit
- url
- company         (e.g., "Google", "Amazon")
- role            (e.g., "Software Engineering Intern")
- steps           (array of interview stages in order)
- timeline        (object with keys like "applied", "heard_back" in YYYY-MM-DD format)
- additional_notes (string with any extra details: stipend, coding challenge info, tips)
- original_title
- original_body

Post metadata: post_id={post_id}, author={author}, created_utc={created}, subreddit={subreddit}, url={url}

Post Title:
"""{title}"""

Post Body:
"""{body}"""
"#,
        post_id = post.post_id,
        author = post.author.as_deref().unwrap_or("unknown"),
        created = post.created_utc,
        subreddit = post.subreddit,
        url = post.url,
        title = post.title,
        body = post.body,
    )
}

/// Removes a surrounding Markdown code fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let Some(inner) = content.strip_prefix("```") else {
        return content;
    };
    let inner = inner.trim_start_matches("json");
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> RedditPost {
        RedditPost {
            post_id: id.to_string(),
            title: "Google STEP offer".into(),
            body: "OA then two interviews".into(),
            author: Some("student".into()),
            created_utc: 1_700_000_000.0,
            url: format!("https://reddit.com/{id}"),
            subreddit: "internships".into(),
            score: 12,
            num_comments: 3,
        }
    }

    #[test]
    fn fallback_keeps_post_metadata() {
        let record = ParsedPost::fallback(&post("abc"), "expected value", "not json");
        assert_eq!(record.post_id, "abc");
        assert_eq!(record.subreddit.as_deref(), Some("internships"));
        assert!(record.company.is_none());
        assert!(record.steps.is_empty());
        assert_eq!(record.raw_response.as_deref(), Some("not json"));

        let value = serde_json::to_value(&record).unwrap();
        assert!(value["company"].is_null());
        assert_eq!(value["parsing_error"], "expected value");
    }

    #[test]
    fn worker_failure_is_tagged() {
        let record = ParsedPost::worker_failure("p1", "connection reset");
        assert_eq!(record.parsing_error.as_deref(), Some("thread error: connection reset"));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("raw_response").is_none());
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn prompt_embeds_title_and_body() {
        let prompt = extraction_prompt(&post("abc"));
        assert!(prompt.contains("\"\"\"Google STEP offer\"\"\""));
        assert!(prompt.contains("OA then two interviews"));
        assert!(prompt.contains("post_id=abc"));
    }
}
