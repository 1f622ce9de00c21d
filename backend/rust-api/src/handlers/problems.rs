use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use super::ApiError;
use crate::models::session::{ProblemListQuery, ProblemListResponse};
use crate::services::problem_catalog::ProblemFilter;
use crate::services::AppState;

/// GET /api/v1/problems
pub async fn list_problems(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProblemListQuery>,
) -> impl IntoResponse {
    let filter = ProblemFilter {
        skill: query.skill.filter(|s| !s.trim().is_empty()),
        max_difficulty: query.max_difficulty,
        limit: query.limit,
        offset: query.offset.unwrap_or(0),
    };

    let (problems, total) = state.catalog.list(&filter).await;
    Json(ProblemListResponse { problems, total })
}

/// GET /api/v1/problems/{id}
pub async fn get_problem(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .catalog
        .get(&problem_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("problem {} not found", problem_id)))
}

/// POST /api/v1/problems/reload (admin)
pub async fn reload_problems(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.catalog.invalidate().await;
    let count = state.catalog.len().await;
    tracing::info!("Problem catalog reloaded: {} problems", count);
    (StatusCode::OK, Json(json!({ "problems": count })))
}
