//! OpenAI-backed summary model.
//!
//! Chat-completions implementation of [`SummaryModel`](super::SummaryModel)
//! with a small retry loop. The API key comes from `OPENAI_API_KEY`; the
//! model name from `DOCDEX_SUMMARY_MODEL`.

use crate::error::{DownstreamError, Result};
use crate::summarize::SummaryModel;
use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Default model when `DOCDEX_SUMMARY_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable naming the summarization model.
pub const MODEL_ENV: &str = "DOCDEX_SUMMARY_MODEL";

/// Sampling temperature for summaries.
const TEMPERATURE: f32 = 0.3;

/// Attempts per call before the error propagates.
const MAX_ATTEMPTS: u32 = 3;

/// OpenAI chat-completions summary model.
pub struct OpenAiSummaryModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSummaryModel {
    /// Creates a model from the environment (`OPENAI_API_KEY`,
    /// `DOCDEX_SUMMARY_MODEL`).
    #[must_use]
    pub fn from_env() -> Self {
        let model = std::env::var(MODEL_ENV).unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self {
            client: Client::new(),
            model,
        }
    }

    /// Creates a model with an explicit model name.
    #[must_use]
    pub fn with_model(model: &str) -> Self {
        Self {
            client: Client::new(),
            model: model.to_string(),
        }
    }

    /// The configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn attempt(&self, prompt: &str) -> Result<String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| DownstreamError::Llm(e.to_string()))?;
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(TEMPERATURE)
            .messages([message.into()])
            .build()
            .map_err(|e| DownstreamError::Llm(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| DownstreamError::Llm(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| DownstreamError::Llm("empty completion".to_string()).into())
    }
}

#[async_trait]
impl SummaryModel for OpenAiSummaryModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(attempt, error = %e, "summary call failed");
                    last_err = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }
        Err(last_err
            .unwrap_or_else(|| DownstreamError::Llm("summary call failed".to_string()).into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_model() {
        let model = OpenAiSummaryModel::with_model("gpt-4o");
        assert_eq!(model.model(), "gpt-4o");
    }

    #[tokio::test]
    #[ignore = "requires OPENAI_API_KEY and network access"]
    async fn test_complete_roundtrip() {
        let model = OpenAiSummaryModel::from_env();
        let summary = model
            .complete("Summarize in one sentence: the cat sat on the mat.")
            .await
            .unwrap();
        assert!(!summary.is_empty());
    }
}
