use axum::{http::StatusCode, routing::post, Json, Router};
use orcamath_api::services::{
    progress_store::MemoryProgressStore,
    step_checker::{HeuristicChecker, RemoteJudge},
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

mod common;

use common::{create_test_app, create_test_app_with, send, spawn_mock, test_config, token_for};

async fn open_demo(app: &axum::Router, token: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/sessions",
        Some(token),
        Some(json!({ "problem_id": "demo" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "open failed: {}", body);
    body
}

async fn submit_text(app: &axum::Router, token: &str, session_id: &str, text: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/api/v1/sessions/{}/steps", session_id),
        Some(token),
        Some(json!({ "text": text })),
    )
    .await
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let app = create_test_app();

    let (status, _) = send(&app.router, "GET", "/api/v1/problems", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app.router,
        "GET",
        "/api/v1/problems",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_open_session_starts_empty_attempt() {
    let app = create_test_app();
    let token = token_for("learner-open", None);

    let session = open_demo(&app.router, &token).await;

    assert_eq!(session["problem"]["id"], "demo");
    assert_eq!(session["steps"].as_array().unwrap().len(), 0);
    assert_eq!(session["solved"], false);
    assert_eq!(session["read_only"], false);
    assert_eq!(session["persisted"], true);
}

#[tokio::test]
async fn test_unknown_problem_is_not_found() {
    let app = create_test_app();
    let token = token_for("learner-404", None);

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/v1/sessions",
        Some(&token),
        Some(json!({ "problem_id": "no-such-problem" })),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn test_worked_solution_solves_and_counts_activity() {
    let app = create_test_app();
    let token = token_for("learner-solve", None);
    let session = open_demo(&app.router, &token).await;
    let session_id = session["session_id"].as_str().unwrap();

    let (status, first) = submit_text(&app.router, &token, session_id, "x/10 = 6").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["step"]["outcome"], "correct");
    assert_eq!(first["solved"], false);
    // last step was correct, so the final check ran
    assert!(first["solved_feedback"].is_string());

    submit_text(&app.router, &token, session_id, "x = 60").await;
    let (status, last) = submit_text(&app.router, &token, session_id, "60 - 15 = 45").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(last["solved"], true);
    assert_eq!(last["session"]["steps"].as_array().unwrap().len(), 3);

    let (status, activity) = send(&app.router, "GET", "/api/v1/activity", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = activity.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["steps_completed"], 3);
    assert_eq!(rows[0]["problems_solved"], 1);

    let (status, profile) = send(&app.router, "GET", "/api/v1/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["id"], "learner-solve");
}

#[tokio::test]
async fn test_incorrect_step_skips_final_check_and_undo_reverts_it() {
    let app = create_test_app();
    let token = token_for("learner-undo", None);
    let session = open_demo(&app.router, &token).await;
    let session_id = session["session_id"].as_str().unwrap();

    let (_, wrong) = submit_text(&app.router, &token, session_id, "60 - 15 = 40").await;
    assert_eq!(wrong["step"]["outcome"], "incorrect");
    assert!(wrong["solved_feedback"].is_null());

    let (status, undone) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/undo", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(undone["removed"]["text"], "60 - 15 = 40");
    assert_eq!(undone["session"]["steps"].as_array().unwrap().len(), 0);

    let (_, activity) = send(&app.router, "GET", "/api/v1/activity", Some(&token), None).await;
    assert_eq!(activity[0]["steps_completed"], 0);

    // undo on an empty attempt is a no-op
    let (status, again) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/undo", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(again["removed"].is_null());
}

#[tokio::test]
async fn test_solved_attempt_is_read_only_until_restart() {
    let app = create_test_app();
    let token = token_for("learner-replay", None);
    let session = open_demo(&app.router, &token).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    for step in ["x/10 = 6", "x = 60", "60 - 15 = 45"] {
        submit_text(&app.router, &token, &session_id, step).await;
    }

    let (status, _) = submit_text(&app.router, &token, &session_id, "45").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/undo", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app.router,
        "DELETE",
        &format!("/api/v1/sessions/{}", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let replay = open_demo(&app.router, &token).await;
    assert_eq!(replay["read_only"], true);
    assert_eq!(replay["solved"], true);
    assert_eq!(replay["steps"].as_array().unwrap().len(), 3);

    let (status, fresh) = send(
        &app.router,
        "POST",
        "/api/v1/sessions",
        Some(&token),
        Some(json!({ "problem_id": "demo", "restart": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(fresh["read_only"], false);
    assert_ne!(fresh["attempt_id"], replay["attempt_id"]);

    // solving again is not a first-time solve
    let fresh_id = fresh["session_id"].as_str().unwrap();
    for step in ["x/10 = 6", "x = 60", "60 - 15 = 45"] {
        submit_text(&app.router, &token, fresh_id, step).await;
    }
    let (_, activity) = send(&app.router, "GET", "/api/v1/activity", Some(&token), None).await;
    assert_eq!(activity[0]["problems_solved"], 1);
    assert_eq!(activity[0]["steps_completed"], 6);
}

#[tokio::test]
async fn test_session_belongs_to_its_user() {
    let app = create_test_app();
    let owner = token_for("learner-owner", None);
    let intruder = token_for("learner-intruder", None);
    let session = open_demo(&app.router, &owner).await;
    let session_id = session["session_id"].as_str().unwrap();

    let (status, _) = send(
        &app.router,
        "GET",
        &format!("/api/v1/sessions/{}", session_id),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = submit_text(&app.router, &intruder, session_id, "x = 60").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_step_input_must_be_exactly_one_kind() {
    let app = create_test_app();
    let token = token_for("learner-input", None);
    let session = open_demo(&app.router, &token).await;
    let uri = format!("/api/v1/sessions/{}/steps", session["session_id"].as_str().unwrap());

    let (status, _) = send(&app.router, "POST", &uri, Some(&token), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "POST",
        &uri,
        Some(&token),
        Some(json!({ "text": "x = 60", "image_base64": "aGk=" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app.router, "POST", &uri, Some(&token), Some(json!({ "text": "   " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        "POST",
        &uri,
        Some(&token),
        Some(json!({ "strokes": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

async fn app_with_recognizer(reply: &'static str) -> common::TestApp {
    let mock = Router::new().route(
        "/recognize",
        post(move |Json(body): Json<Value>| async move {
            assert!(!body["image_base64"].as_str().unwrap_or_default().is_empty());
            Json(json!({ "text": reply }))
        }),
    );
    let base = spawn_mock(mock).await;

    let mut config = test_config();
    config.recognition_url = format!("{}/recognize", base);
    create_test_app_with(
        config,
        Arc::new(MemoryProgressStore::new()),
        Arc::new(HeuristicChecker::new()),
    )
}

#[tokio::test]
async fn test_ink_is_rendered_and_recognized() {
    let app = app_with_recognizer("  x/10 = 6 ").await;
    let token = token_for("learner-ink", None);
    let session = open_demo(&app.router, &token).await;

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/steps", session["session_id"].as_str().unwrap()),
        Some(&token),
        Some(json!({
            "strokes": [[{ "x": 10.0, "y": 10.0 }, { "x": 120.0, "y": 80.0 }]]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["step"]["text"], "x/10 = 6");
    assert_eq!(body["step"]["outcome"], "correct");
    assert!(body["step"]["image_base64"].is_string());
}

#[tokio::test]
async fn test_blank_recognition_is_unprocessable() {
    let app = app_with_recognizer("   ").await;
    let token = token_for("learner-blank", None);
    let session = open_demo(&app.router, &token).await;
    let session_id = session["session_id"].as_str().unwrap();

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/steps", session_id),
        Some(&token),
        Some(json!({ "image_base64": "aGVsbG8=" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, view) = send(
        &app.router,
        "GET",
        &format!("/api/v1/sessions/{}", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(view["steps"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_recognition_outage_is_bad_gateway_and_appends_nothing() {
    let app = create_test_app();
    let token = token_for("learner-outage", None);
    let session = open_demo(&app.router, &token).await;
    let session_id = session["session_id"].as_str().unwrap();

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/steps", session_id),
        Some(&token),
        Some(json!({ "image_base64": "aGVsbG8=" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["message"].is_string());

    // the validating guard was released
    let (status, _) = submit_text(&app.router, &token, session_id, "x/10 = 6").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_submission_is_rejected_while_judging() {
    let slow_judge = Router::new().route(
        "/judge",
        post(|| async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Json(json!({ "outcome": "neutral", "feedback": "Keep going." }))
        }),
    );
    let base = spawn_mock(slow_judge).await;
    let judge = RemoteJudge::new(&format!("{}/judge", base), Some(Duration::from_secs(5))).unwrap();
    let app = create_test_app_with(test_config(), Arc::new(MemoryProgressStore::new()), Arc::new(judge));
    let token = token_for("learner-busy", None);
    let session = open_demo(&app.router, &token).await;
    let session_id = session["session_id"].as_str().unwrap().to_string();

    let first = {
        let router = app.router.clone();
        let token = token.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move { submit_text(&router, &token, &session_id, "x = 60").await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let (status, body) = submit_text(&app.router, &token, &session_id, "x/10 = 6").await;
    assert_eq!(status, StatusCode::CONFLICT, "{}", body);

    let (status, _) = send(
        &app.router,
        "POST",
        &format!("/api/v1/sessions/{}/undo", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, view) = send(
        &app.router,
        "GET",
        &format!("/api/v1/sessions/{}", session_id),
        Some(&token),
        None,
    )
    .await;
    let steps = view["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["text"], "x = 60");
}
