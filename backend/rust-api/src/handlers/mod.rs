use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::AppState;

pub mod activity;
pub mod error;
pub mod problems;
pub mod recognition;
pub mod sessions;

pub use error::ApiError;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let problems = state.catalog.len().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "orcamath-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": {
                "store": state.store_label,
                "judge": state.judge_label,
                "recognition": state.config.recognition_url,
                "mathpix": state.mathpix.is_some(),
                "problems": problems
            }
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// HTTP Basic auth for `/metrics`; credentials come from `METRICS_AUTH`
/// as `user:password`.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}
