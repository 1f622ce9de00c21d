use async_trait::async_trait;
use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use orcamath_api::{
    models::{ActivityRecord, Attempt, Profile, Step},
    services::{
        progress_service::ProgressSync,
        progress_store::{ProgressStore, RestProgressStore, StoreError},
        step_checker::HeuristicChecker,
    },
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

mod common;

use common::{create_test_app_with, send, spawn_mock, test_config, token_for};

/// Store whose every call fails, standing in for an outage.
struct FailingStore;

fn outage() -> StoreError {
    StoreError::Unavailable("store is down".to_string())
}

#[async_trait]
impl ProgressStore for FailingStore {
    async fn find_open_attempt(&self, _: &str, _: &str) -> Result<Option<Attempt>, StoreError> {
        Err(outage())
    }

    async fn find_latest_solved_attempt(
        &self,
        _: &str,
        _: &str,
    ) -> Result<Option<Attempt>, StoreError> {
        Err(outage())
    }

    async fn create_attempt(&self, _: &Attempt) -> Result<Attempt, StoreError> {
        Err(outage())
    }

    async fn save_steps(&self, _: &str, _: &[Step], _: DateTime<Utc>) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn mark_solved(&self, _: &str, _: DateTime<Utc>) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn count_solved_attempts(&self, _: &str, _: &str) -> Result<usize, StoreError> {
        Err(outage())
    }

    async fn get_activity(&self, _: &str, _: NaiveDate) -> Result<Option<ActivityRecord>, StoreError> {
        Err(outage())
    }

    async fn insert_activity(&self, _: &ActivityRecord) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn update_activity(&self, _: &ActivityRecord) -> Result<(), StoreError> {
        Err(outage())
    }

    async fn list_activity(
        &self,
        _: &str,
        _: NaiveDate,
        _: NaiveDate,
    ) -> Result<Vec<ActivityRecord>, StoreError> {
        Err(outage())
    }

    async fn get_profile(&self, _: &str) -> Result<Option<Profile>, StoreError> {
        Err(outage())
    }

    async fn create_profile(&self, _: &Profile) -> Result<(), StoreError> {
        Err(outage())
    }
}

#[tokio::test]
async fn test_store_outage_degrades_to_local_attempt() {
    let sync = ProgressSync::new(Arc::new(FailingStore));

    let entered = sync.enter_problem("learner-offline", "demo", false).await;
    assert!(!entered.persisted);
    assert!(!entered.read_only);
    assert!(entered.attempt.steps.is_empty());

    // none of these surface the outage
    sync.ensure_profile("learner-offline").await;
    sync.record_step(&entered.attempt, entered.persisted).await;
    assert!(!sync.record_solved(&entered.attempt, entered.persisted).await);
    assert!(sync.profile("learner-offline").await.is_none());
}

#[tokio::test]
async fn test_session_keeps_working_during_store_outage() {
    let app = create_test_app_with(
        test_config(),
        Arc::new(FailingStore),
        Arc::new(HeuristicChecker::new()),
    );
    let token = token_for("learner-offline", None);

    let (status, session) = send(
        &app.router,
        "POST",
        "/api/v1/sessions",
        Some(&token),
        Some(json!({ "problem_id": "demo" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["persisted"], false);

    let uri = format!("/api/v1/sessions/{}/steps", session["session_id"].as_str().unwrap());
    let mut last = Value::Null;
    for step in ["x/10 = 6", "x = 60", "60 - 15 = 45"] {
        let (status, body) = send(&app.router, "POST", &uri, Some(&token), Some(json!({ "text": step }))).await;
        assert_eq!(status, StatusCode::OK);
        last = body;
    }
    assert_eq!(last["solved"], true);

    let (status, activity) = send(&app.router, "GET", "/api/v1/activity", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity, json!([]));

    let (status, _) = send(&app.router, "GET", "/api/v1/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn stored_attempt(solved: bool) -> Value {
    json!({
        "id": "attempt-1",
        "user_id": "learner-rest",
        "problem_id": "demo",
        "steps": [],
        "solved": solved,
        "created_at": "2026-01-05T10:00:00Z",
        "updated_at": "2026-01-05T10:00:00Z",
        "completed_at": null
    })
}

#[tokio::test]
async fn test_rest_store_queries_tables_with_service_key() {
    let mock = Router::new()
        .route(
            "/rest/v1/problem_attempts",
            get(
                |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| async move {
                    if headers.get("apikey").and_then(|v| v.to_str().ok()) != Some("service-key") {
                        return (StatusCode::UNAUTHORIZED, Json(json!({ "message": "no key" })));
                    }
                    assert_eq!(query.get("user_id").map(String::as_str), Some("eq.learner-rest"));
                    assert_eq!(query.get("problem_id").map(String::as_str), Some("eq.demo"));
                    let solved = query.get("solved").map(String::as_str) == Some("eq.true");
                    if query.get("select").map(String::as_str) == Some("id") {
                        return (StatusCode::OK, Json(json!([{ "id": "a" }, { "id": "b" }])));
                    }
                    (StatusCode::OK, Json(json!([stored_attempt(solved)])))
                },
            ),
        )
        .route(
            "/rest/v1/activity_log",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                assert_eq!(query.get("activity_date").map(String::as_str), Some("eq.2026-01-05"));
                Json(json!([]))
            }),
        );
    let base = spawn_mock(mock).await;

    let store = RestProgressStore::new(&format!("{}/", base), "service-key");

    let open = store.find_open_attempt("learner-rest", "demo").await.unwrap();
    assert_eq!(open.map(|a| a.solved), Some(false));

    let solved = store
        .find_latest_solved_attempt("learner-rest", "demo")
        .await
        .unwrap();
    assert_eq!(solved.map(|a| a.solved), Some(true));

    assert_eq!(store.count_solved_attempts("learner-rest", "demo").await.unwrap(), 2);

    let day = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
    assert!(store.get_activity("learner-rest", day).await.unwrap().is_none());

    let wrong_key = RestProgressStore::new(&base, "other-key");
    assert!(matches!(
        wrong_key.find_open_attempt("learner-rest", "demo").await,
        Err(StoreError::Status { .. })
    ));
}
