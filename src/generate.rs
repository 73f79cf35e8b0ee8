//! Answer generation providers.
//!
//! Wraps an OpenAI-compatible chat completions endpoint (Groq by default)
//! behind the [`Generator`] trait. Generation runs at temperature 0 so
//! repeated questions against the same document produce the same answer,
//! modulo provider-side nondeterminism.
//!
//! # Retry Strategy
//!
//! Same discipline as the embedding client: 429/5xx and network errors are
//! retried with exponential backoff, other 4xx fail immediately.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::GenerationConfig;

/// Error from the generation service.
#[derive(Debug)]
pub struct GenerationError(pub String);

impl std::fmt::Display for GenerationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "generation failed: {}", self.0)
    }
}

impl std::error::Error for GenerationError {}

/// Prompt template for document Q&A. Asks for markdown tables so tabular
/// answers can be upgraded to charts downstream.
const PROMPT_TEMPLATE: &str = "\
You are a helpful and friendly financial assistant. Your goal is to help the user understand their document.
Use the following pieces of context to answer the user's question clearly and concisely.
If you don't know the answer, just say that you're not sure but you'll do your best to help.
When asked to provide data from a table, please format it as a clean, simple markdown table.

Context: {context}
Question: {question}

Answer:
";

/// Render the Q&A prompt from retrieved context and the user's question.
pub fn build_prompt(context: &str, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{context}", context)
        .replace("{question}", question)
}

/// Trait for answer generation providers.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"llama-3.3-70b-versatile"`).
    fn model_name(&self) -> &str;

    /// Generate an answer for a fully rendered prompt.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Chat completions client for any OpenAI-compatible endpoint.
///
/// Defaults to Groq; requires the `GROQ_API_KEY` environment variable.
pub struct ChatCompletionsGenerator {
    model: String,
    temperature: f64,
    api_base: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        if std::env::var("GROQ_API_KEY").is_err() {
            return Err(GenerationError(
                "GROQ_API_KEY environment variable not set".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError(e.to_string()))?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| GenerationError("GROQ_API_KEY not set".to_string()))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "user", "content": prompt }
            ],
        });

        let url = format!("{}/chat/completions", self.api_base);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| GenerationError(e.to_string()))?;
                        return parse_completion_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(GenerationError(format!(
                            "completions API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(GenerationError(format!(
                        "completions API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(GenerationError(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GenerationError("failed after retries".to_string())))
    }
}

/// Pull `choices[0].message.content` out of a chat completions response.
fn parse_completion_response(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| GenerationError("invalid completions response: missing content".to_string()))
}

/// Create the configured [`Generator`].
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>, GenerationError> {
    Ok(Box::new(ChatCompletionsGenerator::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_context_and_question() {
        let prompt = build_prompt("Revenue was $5B.", "What was revenue?");
        assert!(prompt.contains("Context: Revenue was $5B."));
        assert!(prompt.contains("Question: What was revenue?"));
        assert!(prompt.contains("financial assistant"));
    }

    #[test]
    fn parse_completion_extracts_content() {
        let json = serde_json::json!({
            "choices": [ { "message": { "role": "assistant", "content": "Total revenue was $5B." } } ]
        });
        assert_eq!(
            parse_completion_response(&json).unwrap(),
            "Total revenue was $5B."
        );
    }

    #[test]
    fn parse_completion_rejects_empty_choices() {
        let json = serde_json::json!({ "choices": [] });
        assert!(parse_completion_response(&json).is_err());
    }
}
