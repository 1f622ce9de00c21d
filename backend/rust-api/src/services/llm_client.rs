use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::metrics::LLM_REQUESTS_TOTAL;
use crate::utils::retry::{retry_async_when, RetryConfig};

const LLM_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone)]
pub struct Completion<'a> {
    pub purpose: &'static str,
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("LLM not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("empty response")]
    EmptyChoices,
}

impl LlmError {
    fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(_) => true,
            LlmError::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
                    || status.is_server_error()
            }
            LlmError::NotConfigured(_) | LlmError::EmptyChoices => false,
        }
    }
}

/// OpenAI-compatible chat completions client used by the enrichment worker.
#[derive(Clone)]
pub struct LlmClient {
    http_client: Client,
    api_key: Option<String>,
    endpoint: String,
    retry: RetryConfig,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, api_endpoint: &str, max_attempts: usize) -> Self {
        let http_client = Client::builder()
            .timeout(LLM_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http_client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint: format!("{}/chat/completions", api_endpoint.trim_end_matches('/')),
            retry: RetryConfig::llm(max_attempts),
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// System + user prompt, returns the trimmed content of the first choice.
    pub async fn complete(
        &self,
        params: &Completion<'_>,
        system: &str,
        user: &str,
    ) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(LlmError::NotConfigured("OPENAI_API_KEY"))?;

        let payload = serde_json::json!({
            "model": params.model,
            "messages": [ChatMessage::system(system), ChatMessage::user(user)],
            "temperature": params.temperature,
            "max_tokens": params.max_tokens,
        });

        let result = retry_async_when(
            self.retry.clone(),
            || self.post(api_key, &payload),
            |e: &LlmError| {
                let retry = e.is_retryable();
                if retry {
                    tracing::warn!("LLM {} request failed, retrying: {}", params.purpose, e);
                }
                retry
            },
        )
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        LLM_REQUESTS_TOTAL
            .with_label_values(&[params.purpose, status])
            .inc();

        result
    }

    async fn post(&self, api_key: &str, payload: &serde_json::Value) -> Result<String, LlmError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpStatus { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .ok_or(LlmError::EmptyChoices)
    }
}
