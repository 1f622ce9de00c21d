use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::models::recognition::RecognizeResponse;

pub const MATHPIX_TEXT_URL: &str = "https://api.mathpix.com/v3/text";
const MATHPIX_TIMEOUT: Duration = Duration::from_secs(30);

/// Server side of the recognition proxy: forwards an ink image to Mathpix
/// with the app credentials, which never leave the server.
#[derive(Clone)]
pub struct MathpixService {
    http_client: Client,
    endpoint: String,
    app_id: String,
    app_key: String,
}

impl MathpixService {
    pub fn new(app_id: &str, app_key: &str) -> Result<Self> {
        Self::with_endpoint(MATHPIX_TEXT_URL, app_id, app_key)
    }

    pub fn with_endpoint(endpoint: &str, app_id: &str, app_key: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(MATHPIX_TIMEOUT)
            .build()
            .context("Failed to build Mathpix HTTP client")?;

        Ok(Self {
            http_client,
            endpoint: endpoint.to_string(),
            app_id: app_id.to_string(),
            app_key: app_key.to_string(),
        })
    }

    pub async fn recognize(&self, image_base64: &str) -> Result<RecognizeResponse> {
        let payload = json!({
            "src": format!("data:image/png;base64,{}", image_base64),
            "formats": ["text"],
            "data_options": { "include_asciimath": true },
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("app_id", &self.app_id)
            .header("app_key", &self.app_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to call Mathpix")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Mathpix returned error {}: {}", status, error_text));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Mathpix response")?;

        let text = raw
            .get("text")
            .and_then(|value| value.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        tracing::info!("Mathpix recognized {} characters", text.len());

        Ok(RecognizeResponse {
            text,
            raw: Some(raw),
        })
    }
}
