use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::extractors::ValidJson;
use crate::middlewares::auth::JwtClaims;
use crate::models::session::{OpenSessionRequest, SubmitStepRequest};
use crate::services::session_service::StepInput;
use crate::services::AppState;

pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(req): ValidJson<OpenSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Opening session for user_id={}, problem_id={}, restart={}",
        claims.sub,
        req.problem_id,
        req.restart
    );

    let view = state
        .sessions
        .open(&claims.sub, &req.problem_id, req.restart)
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.sessions.view(&claims.sub, &session_id).await?;
    Ok(Json(view))
}

pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.close(&claims.sub, &session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_step(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
    ValidJson(req): ValidJson<SubmitStepRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Submitting step for session: {}", session_id);

    let input = StepInput::try_from(req)?;
    let response = state
        .sessions
        .submit_step(&claims.sub, &session_id, input)
        .await?;

    Ok(Json(response))
}

pub async fn undo_step(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.sessions.undo(&claims.sub, &session_id).await?;
    Ok(Json(response))
}
