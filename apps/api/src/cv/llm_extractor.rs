use async_trait::async_trait;
use tracing::{debug, warn};

use crate::cv::fields::ParsedCv;
use crate::cv::prompts::{CV_EXTRACT_PROMPT, CV_EXTRACT_SYSTEM};
use crate::cv::repair::parse_llm_json;
use crate::cv::text::truncate_chars;
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_GUESSING_INSTRUCTION};
use crate::llm_client::{LlmClient, LlmError};

/// Characters of CV text sent to the model.
pub const MAX_LLM_INPUT_CHARS: usize = 12_000;

#[derive(Debug, thiserror::Error)]
pub enum FieldExtractionError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("model output is not a JSON object")]
    Unparseable,
}

/// Turns cleaned CV text into structured fields.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ParsedCv, FieldExtractionError>;
}

pub struct LlmFieldExtractor {
    llm: LlmClient,
}

impl LlmFieldExtractor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

pub fn build_prompt(text: &str) -> String {
    CV_EXTRACT_PROMPT
        .replace("{no_guessing}", NO_GUESSING_INSTRUCTION)
        .replace("{cv_text}", truncate_chars(text, MAX_LLM_INPUT_CHARS))
}

#[async_trait]
impl FieldExtractor for LlmFieldExtractor {
    async fn extract(&self, text: &str) -> Result<ParsedCv, FieldExtractionError> {
        let system = format!("{CV_EXTRACT_SYSTEM} {JSON_ONLY_SYSTEM}");
        let raw = self.llm.complete(&build_prompt(text), &system).await?;

        let Some(value) = parse_llm_json(&raw) else {
            warn!("CV extraction output could not be repaired ({} chars)", raw.len());
            return Err(FieldExtractionError::Unparseable);
        };
        if !value.is_object() {
            return Err(FieldExtractionError::Unparseable);
        }
        debug!("CV extraction output parsed");
        Ok(ParsedCv::from_value(&value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn anthropic_reply(text: &str) -> serde_json::Value {
        json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 10, "output_tokens": 20}
        })
    }

    async fn extractor_for(server: &MockServer) -> LlmFieldExtractor {
        LlmFieldExtractor::new(
            LlmClient::with_endpoint("test-key".into(), server.uri())
                .without_backoff(),
        )
    }

    #[test]
    fn test_prompt_truncates_long_text() {
        let text = "é".repeat(MAX_LLM_INPUT_CHARS + 500);
        let prompt = build_prompt(&text);
        assert_eq!(prompt.matches('é').count(), MAX_LLM_INPUT_CHARS);
        assert!(prompt.contains("Never guess"));
    }

    #[tokio::test]
    async fn test_repairs_truncated_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_reply(
                "```json\n{\"full_name\": \"Jane Doe\", \"skills\": [\"Rust\", \"Go\",",
            )))
            .mount(&server)
            .await;

        let parsed = extractor_for(&server).await.extract("some cv").await.unwrap();
        assert_eq!(parsed.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(parsed.skills, vec!["Rust", "Go"]);
    }

    #[tokio::test]
    async fn test_prose_output_is_unparseable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(anthropic_reply("Sorry, I cannot read this document.")),
            )
            .mount(&server)
            .await;

        let err = extractor_for(&server).await.extract("some cv").await.unwrap_err();
        assert!(matches!(err, FieldExtractionError::Unparseable));
    }
}
