use axum::{
    extract::{Extension, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::middlewares::auth::JwtClaims;
use crate::models::session::ActivityQuery;
use crate::services::AppState;
use crate::utils::time::default_activity_window;

/// GET /api/v1/activity?from=YYYY-MM-DD&to=YYYY-MM-DD
///
/// Defaults to the last 30 days. Days without activity are simply absent.
pub async fn get_activity(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<ActivityQuery>,
) -> impl IntoResponse {
    let (from, to) = default_activity_window(query.to, query.from);
    let rows = state.progress.activity(&claims.sub, from, to).await;
    Json(rows)
}

/// GET /api/v1/profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .progress
        .profile(&claims.sub)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("profile not found"))
}
