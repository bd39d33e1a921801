//! Client seam for turning free text into question drafts.

use std::env;

use async_trait::async_trait;
use quiz_core::model::QuestionDraft;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

const SYSTEM_PROMPT: &str = "\
You extract multiple-choice questions from free-form study material.
Return every question you can find as a JSON array. Each element looks like
{\"question\": \"...\", \"options\": [\"...\", \"...\"], \"correctAnswerIndex\": 0}.
Keep the original number and order of options when they are given and mark the
correct one with its 0-based index. When inventing questions from plain notes,
use four options and vary the position of the correct answer.
Output only the JSON array, with no commentary.";

/// Anything that can turn free text into unvalidated question drafts.
#[async_trait]
pub trait QuestionExtractor: Send + Sync {
    /// # Errors
    ///
    /// Returns `ExtractionError` when the backend is unavailable or its
    /// answer cannot be parsed.
    async fn extract(&self, text: &str) -> Result<Vec<QuestionDraft>, ExtractionError>;
}

#[derive(Clone, Debug)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ExtractionConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("QUIZ_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("QUIZ_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("QUIZ_AI_MODEL").unwrap_or_else(|_| "gpt-4o".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Chat-completions backed extractor for OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiExtractor {
    client: Client,
    config: Option<ExtractionConfig>,
}

impl OpenAiExtractor {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ExtractionConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<ExtractionConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

#[async_trait]
impl QuestionExtractor for OpenAiExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<QuestionDraft>, ExtractionError> {
        let config = self.config.as_ref().ok_or(ExtractionError::Disabled)?;

        let url = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            temperature: 0.3,
        };

        tracing::debug!(model = %config.model, chars = text.len(), "requesting question extraction");
        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractionError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(ExtractionError::EmptyResponse)?;

        parse_drafts(&content)
    }
}

/// Parse a model reply into drafts.
///
/// Accepts a bare JSON array, a single object, or either wrapped in a
/// fenced `json` code block. Elements that do not have the expected shape
/// are skipped; structural validation is left to the caller.
///
/// # Errors
///
/// Returns `ExtractionError::Parse` if the payload is not JSON at all.
pub fn parse_drafts(content: &str) -> Result<Vec<QuestionDraft>, ExtractionError> {
    let payload = strip_fence(content);
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        obj @ serde_json::Value::Object(_) => vec![obj],
        other => {
            return Err(ExtractionError::Parse(format!(
                "expected an array or object, got {other}"
            )));
        }
    };

    let mut drafts = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawDraft>(item) {
            Ok(raw) => drafts.push(raw.into_draft()),
            Err(err) => tracing::warn!(index, error = %err, "skipping malformed extracted question"),
        }
    }
    Ok(drafts)
}

fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(start) = trimmed.find("```json") else {
        return trimmed;
    };
    let body = &trimmed[start + "```json".len()..];
    match body.find("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraft {
    question: String,
    options: Vec<String>,
    correct_answer_index: i64,
}

impl RawDraft {
    fn into_draft(self) -> QuestionDraft {
        // A negative index can never be in range; let validation reject it.
        let correct = usize::try_from(self.correct_answer_index).unwrap_or(usize::MAX);
        QuestionDraft::new(self.question, self.options, correct)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let drafts = parse_drafts(
            r#"[{"question":"2+2?","options":["3","4"],"correctAnswerIndex":1},
                {"question":"Sky?","options":["blue","green","red"],"correctAnswerIndex":0}]"#,
        )
        .unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].text, "2+2?");
        assert_eq!(drafts[0].correct_option_index, 1);
        assert_eq!(drafts[1].options.len(), 3);
    }

    #[test]
    fn parses_fenced_single_object() {
        let reply = "Here you go:\n```json\n{\"question\":\"Q\",\"options\":[\"a\",\"b\"],\"correctAnswerIndex\":0}\n```\n";
        let drafts = parse_drafts(reply).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].text, "Q");
    }

    #[test]
    fn skips_malformed_elements() {
        let drafts = parse_drafts(
            r#"[{"question":"Q","options":["a","b"],"correctAnswerIndex":1},
                {"question":"missing options","correctAnswerIndex":0}]"#,
        )
        .unwrap();
        assert_eq!(drafts.len(), 1);
    }

    #[test]
    fn negative_index_fails_validation_later() {
        let drafts =
            parse_drafts(r#"{"question":"Q","options":["a","b"],"correctAnswerIndex":-1}"#)
                .unwrap();
        assert!(drafts[0].check().is_err());
    }

    #[test]
    fn non_json_is_a_parse_error() {
        let err = parse_drafts("sorry, I cannot help with that").unwrap_err();
        assert!(matches!(err, ExtractionError::Parse(_)));
        let err = parse_drafts("42").unwrap_err();
        assert!(matches!(err, ExtractionError::Parse(_)));
    }

    #[tokio::test]
    async fn disabled_extractor_refuses() {
        let extractor = OpenAiExtractor::new(None);
        assert!(!extractor.enabled());
        let err = extractor.extract("anything").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Disabled));
    }
}
