//! Shared LLM transport used by the Analyzer (§4.H) and Reranker (§4.G).
//! Both need nothing more than "send a prompt, get text back" — the
//! structured-output schema enforcement happens one layer up, in each
//! component, matching the teacher's thin-trait-at-the-seam style
//! (`tokenizer.rs::Tokenizer`).

use async_trait::async_trait;
use search_core::{AppError, AppResult};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send `prompt`, return the raw completion text (expected to be JSON
    /// when the caller requested structured output).
    async fn complete(&self, prompt: &str) -> AppResult<String>;
}

pub struct HttpLlmProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl HttpLlmProvider {
    pub fn new(client: reqwest::Client, endpoint: String, api_key: String, model: String) -> Self {
        Self { client, endpoint, api_key, model }
    }
}

#[derive(serde::Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(serde::Deserialize)]
struct CompletionResponse {
    text: String,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest { model: &self.model, prompt })
            .send()
            .await
            .map_err(|e| AppError::Unavailable(format!("llm provider request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::Unavailable(format!("llm provider returned status {}", resp.status())));
        }
        let body: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Unavailable(format!("llm provider returned malformed body: {e}")))?;
        Ok(body.text)
    }
}
