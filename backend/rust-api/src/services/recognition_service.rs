use reqwest::{Client, StatusCode};

use crate::metrics::RECOGNITION_REQUESTS_TOTAL;
use crate::models::recognition::{RecognizeRequest, RecognizeResponse};

#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("recognition service unreachable: {0}")]
    Network(#[source] reqwest::Error),
    #[error("recognition service returned {status}: {body}")]
    Service { status: StatusCode, body: String },
    #[error("invalid recognition response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Client for the OCR proxy. One request per image, no retry.
#[derive(Clone)]
pub struct RecognitionClient {
    http_client: Client,
    url: String,
}

impl RecognitionClient {
    pub fn new(url: String) -> Self {
        Self {
            http_client: Client::new(),
            url,
        }
    }

    pub async fn recognize(&self, image_base64: &str) -> Result<String, RecognitionError> {
        tracing::debug!(
            "Sending handwriting to recognition proxy: {} ({} base64 bytes)",
            self.url,
            image_base64.len()
        );

        let body = RecognizeRequest {
            image_base64: image_base64.to_string(),
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RECOGNITION_REQUESTS_TOTAL
                    .with_label_values(&["network_error"])
                    .inc();
                RecognitionError::Network(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            RECOGNITION_REQUESTS_TOTAL
                .with_label_values(&["service_error"])
                .inc();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RecognitionError::Service { status, body });
        }

        let parsed: RecognizeResponse = response.json().await.map_err(|e| {
            RECOGNITION_REQUESTS_TOTAL
                .with_label_values(&["decode_error"])
                .inc();
            RecognitionError::Decode(e)
        })?;

        RECOGNITION_REQUESTS_TOTAL
            .with_label_values(&["success"])
            .inc();

        Ok(parsed.text.trim().to_string())
    }
}
