//! Chat-completions client for the query resolution layer.

use crate::error::{Result, StatGraphError};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Request timeout; resolution calls are interactive.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Bounded retry for transient transport failures.
const MAX_ATTEMPTS: u32 = 3;

const JSON_SYSTEM_MESSAGE: &str = "Return JSON only, no text.";

#[derive(Clone)]
pub struct LlmClient {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| StatGraphError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let base_url = std::env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        Ok(Self::new(api_key, model, base_url))
    }

    /// One JSON-only completion round-trip.
    ///
    /// Transport failures are retried up to the attempt bound; non-2xx
    /// statuses and malformed bodies are not, since each resolution is
    /// idempotent and the caller converts failures into a not-found result.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": JSON_SYSTEM_MESSAGE},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
        });

        let response = self.post(&body).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StatGraphError::Llm(format!(
                "LLM API error ({}): {}",
                status, text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StatGraphError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = json.get("error") {
            return Err(StatGraphError::Llm(format!("LLM API error: {}", error)));
        }

        let content = json["choices"]
            .get(0)
            .and_then(|choice| choice["message"]["content"].as_str())
            .ok_or_else(|| StatGraphError::Llm("No content in LLM response".to_string()))?;
        if content.is_empty() {
            return Err(StatGraphError::Llm("Empty content in LLM response".to_string()));
        }
        Ok(content.to_string())
    }

    /// Completion parsed into a typed structure; the response may arrive
    /// fenced in a markdown code block.
    pub async fn complete_json<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let content = self.complete(prompt).await?;
        parse_json_content(&content)
    }

    async fn post(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            let result = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
                .timeout(REQUEST_TIMEOUT)
                .json(body)
                .send()
                .await;
            match result {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        "LLM request attempt {}/{} failed: {}",
                        attempt, MAX_ATTEMPTS, e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(StatGraphError::Llm(format!(
            "LLM API unreachable after {} attempts: {}",
            MAX_ATTEMPTS,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

/// Strip markdown fences and parse the content as JSON.
pub fn parse_json_content<T: DeserializeOwned>(content: &str) -> Result<T> {
    let cleaned = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    serde_json::from_str(cleaned)
        .map_err(|e| StatGraphError::Llm(format!("Unparseable LLM response: {}", e)))
}
