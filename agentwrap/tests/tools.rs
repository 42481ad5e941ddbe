//! The research pipeline: search, parse, write.

use agentwrap::errors::AgentError;
use agentwrap::test_support::{FakeCompletionClient, FakePostSource};
use agentwrap::tools::pool::MAX_WORKERS;
use agentwrap::tools::{search_posts, JsonlWriter, PostParser, RedditPost, SearchOptions, WriteSummary};
use serde_json::{json, Value};
use std::time::Duration;

fn post(id: &str, title: &str) -> RedditPost {
    RedditPost {
        post_id: id.to_string(),
        title: title.to_string(),
        body: format!("body of {id}"),
        author: Some("applicant".into()),
        created_utc: 1_717_200_000.0,
        url: format!("https://www.reddit.com/r/internships/comments/{id}"),
        subreddit: "internships".into(),
        score: 5,
        num_comments: 2,
    }
}

fn record_for(id: &str) -> String {
    json!({
        "post_id": id,
        "company": "Google",
        "role": "Software Engineering Intern",
        "steps": ["OA", "Technical interview"],
        "timeline": {"applied": "2024-09-01"}
    })
    .to_string()
}

fn options() -> SearchOptions {
    SearchOptions {
        subreddits: vec!["internships".into(), "csMajors".into()],
        limit_per_query: 10,
        throttle: Duration::ZERO,
    }
}

#[tokio::test(flavor = "current_thread")]
async fn bad_model_output_only_affects_its_own_post() {
    let client = FakeCompletionClient::from_fn(|request| {
        let prompt = &request.messages[1].content;
        if prompt.contains("post_id=p2") {
            Ok("Sorry, I cannot help with that.".to_string())
        } else if prompt.contains("post_id=p1") {
            Ok(format!("```json\n{}\n```", record_for("p1")))
        } else {
            Ok(record_for("p3"))
        }
    });
    let parser = PostParser::new(client);

    let records = parser
        .parse_posts(vec![
            post("p1", "Google offer"),
            post("p2", "Rant"),
            post("p3", "Google timeline"),
        ])
        .await;

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].company.as_deref(), Some("Google"));
    assert!(!records[0].is_fallback());

    let bad = &records[1];
    assert_eq!(bad.post_id, "p2");
    assert!(bad.parsing_error.is_some());
    assert_eq!(bad.raw_response.as_deref(), Some("Sorry, I cannot help with that."));
    assert_eq!(bad.original_title.as_deref(), Some("Rant"));

    assert_eq!(records[2].steps, vec!["OA", "Technical interview"]);
}

#[tokio::test(flavor = "current_thread")]
async fn failed_completion_becomes_thread_error_record() {
    let client = FakeCompletionClient::from_fn(|request| {
        if request.messages[1].content.contains("post_id=b") {
            Err(AgentError::backend("rate limited"))
        } else {
            Ok(record_for("a"))
        }
    });
    let parser = PostParser::new(client);

    let records = parser
        .parse_posts(vec![post("a", "first"), post("b", "second")])
        .await;

    assert!(!records[0].is_fallback());
    assert_eq!(records[1].post_id, "b");
    assert!(records[1]
        .parsing_error
        .as_deref()
        .is_some_and(|error| error.starts_with("thread error: ")));
}

#[tokio::test(flavor = "current_thread")]
async fn parsing_runs_at_most_ten_posts_at_once() {
    let client = FakeCompletionClient::from_fn(|_| Ok(record_for("x")))
        .with_delay(Duration::from_millis(20));
    let parser = PostParser::new(client.clone());

    let posts = (0..15).map(|i| post(&format!("p{i}"), "t")).collect();
    let records = parser.parse_posts(posts).await;

    assert_eq!(records.len(), 15);
    assert_eq!(client.requests().len(), 15);
    assert!(client.peak_concurrency() <= MAX_WORKERS);
    assert!(client.peak_concurrency() > 1);
}

#[tokio::test(flavor = "current_thread")]
async fn search_dedupes_and_survives_failing_subreddit() {
    let source = FakePostSource::new()
        .with_results(
            "internships",
            "google intern",
            vec![post("p1", "a"), post("p2", "b")],
        )
        .with_failure("csMajors", "google intern", "503 Service Unavailable")
        .with_results("internships", "google OA", vec![post("p2", "b"), post("p3", "c")]);
    let queries = vec!["google intern".to_string(), "google OA".to_string()];

    let posts = search_posts(&source, &queries, &options()).await;

    let ids: Vec<&str> = posts.iter().map(|post| post.post_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
    assert_eq!(source.calls().len(), 4);
}

#[tokio::test(flavor = "current_thread")]
async fn parsed_records_land_in_jsonl_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakePostSource::new().with_results(
        "internships",
        "amazon intern",
        vec![post("a1", "Amazon offer"), post("a2", "Amazon OA")],
    );
    let posts = search_posts(&source, &["amazon intern".to_string()], &options()).await;

    let parser = PostParser::new(FakeCompletionClient::from_fn(|request| {
        let id = if request.messages[1].content.contains("post_id=a1") { "a1" } else { "a2" };
        Ok(record_for(id))
    }));
    let records = parser.parse_posts(posts).await;

    let writer = JsonlWriter::new(dir.path().join("results.txt"));
    assert_eq!(
        writer.write(&records).await,
        WriteSummary::Written { written_count: 2 }
    );

    let text = tokio::fs::read_to_string(writer.path()).await.unwrap();
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines[0]["post_id"], "a1");
    assert_eq!(lines[1]["post_id"], "a2");
    assert!(lines[0].get("parsing_error").is_none());
}
