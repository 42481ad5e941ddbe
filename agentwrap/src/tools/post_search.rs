//! Reddit post search.
//!
//! [`search_posts`] fans a list of queries out over a list of subreddits
//! through any [`PostSource`], deduplicating by post id. [`RedditClient`] is
//! the HTTP source, authenticated with app-only OAuth.

use crate::config::RedditConfig;
use crate::errors::{AgentError, AgentResult};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_SUBREDDITS: [&str; 3] = ["internships", "cscareerquestions", "csMajors"];
pub const DEFAULT_LIMIT_PER_QUERY: u32 = 10;
/// Pause after each successful search call.
pub const DEFAULT_THROTTLE: Duration = Duration::from_secs(1);

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
const API_BASE_URL: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub post_id: String,
    pub title: String,
    pub body: String,
    pub author: Option<String>,
    pub created_utc: f64,
    pub url: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: u64,
}

/// Anything that can answer "search this subreddit for this query".
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn search(&self, subreddit: &str, query: &str, limit: u32)
        -> AgentResult<Vec<RedditPost>>;
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub subreddits: Vec<String>,
    pub limit_per_query: u32,
    pub throttle: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            subreddits: DEFAULT_SUBREDDITS.iter().map(ToString::to_string).collect(),
            limit_per_query: DEFAULT_LIMIT_PER_QUERY,
            throttle: DEFAULT_THROTTLE,
        }
    }
}

/// Searches every `(query, subreddit)` pair and returns unique posts in the
/// order first seen. A failing pair is logged and skipped.
pub async fn search_posts<S: PostSource + ?Sized>(
    source: &S,
    queries: &[String],
    options: &SearchOptions,
) -> Vec<RedditPost> {
    let mut seen = HashSet::new();
    let mut posts = Vec::new();

    for query in queries {
        for subreddit in &options.subreddits {
            match source
                .search(subreddit, query, options.limit_per_query)
                .await
            {
                Ok(found) => {
                    for post in found {
                        if seen.insert(post.post_id.clone()) {
                            posts.push(post);
                        }
                    }
                    if !options.throttle.is_zero() {
                        tokio::time::sleep(options.throttle).await;
                    }
                }
                Err(err) => {
                    tracing::warn!(%query, %subreddit, error = %err, "post search failed; skipping");
                }
            }
        }
    }

    posts
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Reddit API client using the client-credentials grant.
pub struct RedditClient {
    config: RedditConfig,
    http: reqwest::Client,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            config,
            http,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> AgentResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header(USER_AGENT, &self.config.user_agent)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Network {
                operation: "reddit_token".to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let body: Value = response.json().await?;
        let value = body["access_token"]
            .as_str()
            .ok_or_else(|| AgentError::Serialization {
                format: "json".to_string(),
                reason: "token response has no access_token".to_string(),
            })?
            .to_string();
        // refresh a minute early
        let lifetime = body["expires_in"].as_u64().unwrap_or(3600).saturating_sub(60);

        *guard = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(value)
    }
}

#[async_trait]
impl PostSource for RedditClient {
    async fn search(
        &self,
        subreddit: &str,
        query: &str,
        limit: u32,
    ) -> AgentResult<Vec<RedditPost>> {
        let token = self.access_token().await?;
        let limit = limit.to_string();
        let response = self
            .http
            .get(format!("{API_BASE_URL}/r/{subreddit}/search"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(USER_AGENT, &self.config.user_agent)
            .query(&[
                ("q", query),
                ("restrict_sr", "1"),
                ("sort", "relevance"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Network {
                operation: "reddit_search".to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let listing: Value = response.json().await?;
        Ok(posts_from_listing(&listing, subreddit))
    }
}

/// Extracts posts from a Reddit listing document.
fn posts_from_listing(listing: &Value, subreddit: &str) -> Vec<RedditPost> {
    listing["data"]["children"]
        .as_array()
        .map(|children| {
            children
                .iter()
                .filter_map(|child| {
                    let data = &child["data"];
                    Some(RedditPost {
                        post_id: data["id"].as_str()?.to_string(),
                        title: data["title"].as_str().unwrap_or_default().to_string(),
                        body: data["selftext"].as_str().unwrap_or_default().to_string(),
                        author: data["author"]
                            .as_str()
                            .filter(|author| *author != "[deleted]")
                            .map(str::to_string),
                        created_utc: data["created_utc"].as_f64().unwrap_or_default(),
                        url: data["url"].as_str().unwrap_or_default().to_string(),
                        subreddit: subreddit.to_string(),
                        score: data["score"].as_i64().unwrap_or_default(),
                        num_comments: data["num_comments"].as_u64().unwrap_or_default(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePostSource;
    use serde_json::json;

    fn post(id: &str, subreddit: &str) -> RedditPost {
        RedditPost {
            post_id: id.to_string(),
            title: format!("title {id}"),
            body: String::new(),
            author: None,
            created_utc: 0.0,
            url: String::new(),
            subreddit: subreddit.to_string(),
            score: 0,
            num_comments: 0,
        }
    }

    fn options() -> SearchOptions {
        SearchOptions {
            subreddits: vec!["internships".into(), "csMajors".into()],
            limit_per_query: 5,
            throttle: Duration::ZERO,
        }
    }

    #[test]
    fn defaults_match_the_internship_subreddits() {
        let options = SearchOptions::default();
        assert_eq!(options.subreddits, vec!["internships", "cscareerquestions", "csMajors"]);
        assert_eq!(options.limit_per_query, 10);
        assert_eq!(options.throttle, Duration::from_secs(1));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn dedupes_by_post_id_keeping_first() {
        let source = FakePostSource::new()
            .with_results("internships", "google", vec![post("a", "internships"), post("b", "internships")])
            .with_results("csMajors", "google", vec![post("b", "csMajors"), post("c", "csMajors")]);

        let posts = search_posts(&source, &["google".to_string()], &options()).await;
        let ids: Vec<&str> = posts.iter().map(|p| p.post_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(posts[1].subreddit, "internships");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failing_pairs_are_skipped() {
        let source = FakePostSource::new()
            .with_failure("internships", "meta", "HTTP 429")
            .with_results("csMajors", "meta", vec![post("z", "csMajors")]);

        let posts = search_posts(&source, &["meta".to_string()], &options()).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(source.calls().len(), 2);
    }

    #[test]
    fn listing_parsing_drops_deleted_authors() {
        let listing = json!({"data": {"children": [
            {"data": {"id": "p1", "title": "T", "selftext": "B", "author": "[deleted]",
                      "created_utc": 1.5, "url": "u", "score": 4, "num_comments": 2}},
            {"data": {"title": "no id"}}
        ]}});
        let posts = posts_from_listing(&listing, "internships");
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].author, None);
        assert_eq!(posts[0].num_comments, 2);
    }
}
