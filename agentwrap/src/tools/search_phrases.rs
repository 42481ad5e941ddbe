//! Generation of Reddit search queries for a topic.

use crate::config::DEFAULT_OPENAI_MODEL;
use crate::errors::AgentResult;
use crate::models::{ChatRequest, CompletionClient};

pub const DEFAULT_PHRASE_COUNT: usize = 8;
const SYSTEM_PROMPT: &str = "You generate diverse Reddit search queries.";

pub struct SearchPhraseGenerator<C> {
    client: C,
    model: String,
}

impl<C: CompletionClient> SearchPhraseGenerator<C> {
    pub fn new(client: C) -> Self {
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

    /// Asks the model for `count` distinct search queries about `topic`.
    ///
    /// # Errors
    ///
    /// Fails only when the completion call fails; unstructured answers are
    /// split into lines instead.
    pub async fn generate(&self, topic: &str, count: usize) -> AgentResult<Vec<String>> {
        let prompt = format!(
            "Given the topic: \"{topic}\", generate {count} distinct Reddit search queries\n\
             that a user might enter to find posts about this topic. Output as a JSON array of strings."
        );
        let request = ChatRequest::new()
            .with_model(&self.model)
            .system(SYSTEM_PROMPT)
            .user(prompt)
            .with_temperature(0.7)
            .with_max_tokens(200);

        let content = self.client.complete(request).await?;
        let mut phrases = parse_phrases(content.trim());
        phrases.truncate(count);
        Ok(phrases)
    }
}

/// A JSON array of strings, or else one phrase per non-blank line.
fn parse_phrases(content: &str) -> Vec<String> {
    if let Ok(phrases) = serde_json::from_str::<Vec<String>>(content) {
        return phrases;
    }

    content
        .lines()
        .map(|line| {
            strip_list_marker(line.trim())
                .trim_end_matches(',')
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty() && line != "[" && line != "]")
        .collect()
}

/// Drops a leading `1.`, `2)`, `-` or `*` list marker.
fn strip_list_marker(line: &str) -> &str {
    let unnumbered = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let line = if unnumbered.len() < line.len() {
        unnumbered.strip_prefix(['.', ')']).unwrap_or(line)
    } else {
        line
    };
    line.trim_start_matches(['-', '*']).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCompletionClient;

    #[test]
    fn json_arrays_are_taken_verbatim() {
        assert_eq!(
            parse_phrases(r#"["google internship interview", "amazon SDE intern OA"]"#),
            vec!["google internship interview", "amazon SDE intern OA"]
        );
    }

    #[test]
    fn prose_falls_back_to_lines() {
        let content = "1. \"google intern timeline\"\n\n- meta intern offer\n* \"apple OA\",";
        assert_eq!(
            parse_phrases(content),
            vec!["google intern timeline", "meta intern offer", "apple OA"]
        );
    }

    #[test]
    fn leading_years_are_not_list_markers() {
        assert_eq!(strip_list_marker("2025 summer internships"), "2025 summer internships");
        assert_eq!(strip_list_marker("3) faang offers"), "faang offers");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn requests_creative_sampling_and_truncates() {
        let client = FakeCompletionClient::with_responses([Ok(r#"["a","b","c"]"#.to_string())]);
        let generator = SearchPhraseGenerator::new(client.clone());

        let phrases = generator.generate("software internships", 2).await.unwrap();
        assert_eq!(phrases, vec!["a", "b"]);

        let request = &client.requests()[0];
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.max_tokens, Some(200));
        assert!(request.messages[1].content.contains("software internships"));
    }
}
