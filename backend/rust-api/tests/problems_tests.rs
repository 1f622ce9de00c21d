use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use orcamath_api::{
    create_router,
    models::Problem,
    services::{
        problem_catalog::ProblemCatalog, progress_store::MemoryProgressStore,
        step_checker::HeuristicChecker, AppState,
    },
};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use tower::ServiceExt;

mod common;

use common::{send, test_config, token_for};

fn problem(id: &str, tags: &[&str], difficulty: u32) -> Problem {
    Problem {
        id: id.to_string(),
        question: format!("Question {}", id),
        answer: "1".to_string(),
        skill_tags: tags.iter().map(|t| t.to_string()).collect(),
        difficulty: Some(difficulty),
    }
}

fn catalog_app() -> Router {
    let catalog = ProblemCatalog::from_problems(vec![
        problem("1", &["fractions"], 3),
        problem("2", &["percentages"], 7),
        problem("3", &["Fractions", "ratios"], 12),
    ]);
    let state = AppState::with_parts(
        test_config(),
        Arc::new(MemoryProgressStore::new()),
        Arc::new(HeuristicChecker::new()),
        "heuristic",
        Arc::new(catalog),
    )
    .unwrap();
    create_router(Arc::new(state))
}

#[tokio::test]
async fn test_list_problems_starts_with_demo() {
    let app = catalog_app();
    let token = token_for("learner-browse", None);

    let (status, body) = send(&app, "GET", "/api/v1/problems", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["problems"][0]["id"], "demo");
}

#[tokio::test]
async fn test_list_problems_filters_and_pages() {
    let app = catalog_app();
    let token = token_for("learner-browse", None);

    let (_, body) = send(
        &app,
        "GET",
        "/api/v1/problems?skill=fractions",
        Some(&token),
        None,
    )
    .await;
    let ids: Vec<&str> = body["problems"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["1", "3"]);

    let (_, body) = send(
        &app,
        "GET",
        "/api/v1/problems?skill=fractions&max_difficulty=5",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["total"], 1);

    let (_, body) = send(
        &app,
        "GET",
        "/api/v1/problems?limit=2&offset=1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["total"], 4);
    assert_eq!(body["problems"].as_array().unwrap().len(), 2);
    assert_eq!(body["problems"][0]["id"], "1");
}

#[tokio::test]
async fn test_get_problem_by_id() {
    let app = catalog_app();
    let token = token_for("learner-browse", None);

    let (status, body) = send(&app, "GET", "/api/v1/problems/2", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["skill_tags"], json!(["percentages"]));

    let (status, _) = send(&app, "GET", "/api/v1/problems/99", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reload_requires_service_role() {
    let app = catalog_app();

    let learner = token_for("learner-browse", None);
    let (status, _) = send(&app, "POST", "/api/v1/problems/reload", Some(&learner), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let service = token_for("ops", Some("service_role"));
    let (status, body) = send(&app, "POST", "/api/v1/problems/reload", Some(&service), None).await;
    assert_eq!(status, StatusCode::OK);
    // fixed catalogs are not reloaded from disk
    assert_eq!(body["problems"], 4);
}

#[tokio::test]
async fn test_health_reports_dependencies() {
    let app = catalog_app();

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["judge"], "heuristic");
    assert_eq!(body["dependencies"]["mathpix"], false);
    assert_eq!(body["dependencies"]["problems"], 4);
}

async fn get_metrics(app: &Router, credentials: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().method("GET").uri("/metrics");
    if let Some(credentials) = credentials {
        builder = builder.header(
            "authorization",
            format!("Basic {}", general_purpose::STANDARD.encode(credentials)),
        );
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
#[serial]
async fn test_metrics_require_basic_auth() {
    std::env::set_var("METRICS_AUTH", "scraper:secret");
    let app = catalog_app();

    // generate at least one request sample
    send(&app, "GET", "/health", None, None).await;

    let (status, _) = get_metrics(&app, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get_metrics(&app, Some("scraper:wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, text) = get_metrics(&app, Some("scraper:secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("http_requests_total"));

    std::env::remove_var("METRICS_AUTH");
}
