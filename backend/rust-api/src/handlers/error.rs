use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::services::session_service::SessionError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::NotFound(_) | SessionError::ProblemNotFound(_) => {
                ApiError::NotFound(message)
            }
            SessionError::Forbidden => ApiError::Forbidden(message),
            SessionError::Busy | SessionError::ReadOnly => ApiError::Conflict(message),
            SessionError::InvalidInput(_) => ApiError::BadRequest(message),
            SessionError::Unrecognized => ApiError::Unprocessable(message),
            SessionError::Recognition(e) => {
                tracing::warn!("Recognition failed: {}", e);
                ApiError::BadGateway(
                    "Handwriting recognition is unavailable right now, please try again"
                        .to_string(),
                )
            }
            SessionError::Canvas(e) => {
                tracing::error!("Canvas capture failed: {}", e);
                ApiError::Internal(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::BadGateway(message) => (StatusCode::BAD_GATEWAY, message),
            ApiError::ServiceUnavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };
        let json_response = serde_json::json!({
            "message": message,
            "status": status.as_u16()
        });
        (status, Json(json_response)).into_response()
    }
}
