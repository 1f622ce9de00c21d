use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecognizeRequest {
    #[validate(length(min = 1, message = "image_base64 must not be empty"))]
    pub image_base64: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecognizeResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}
