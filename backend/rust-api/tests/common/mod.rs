#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use orcamath_api::{
    config::{CanvasConfig, Config, EnrichConfig, JudgeMode, LlmConfig, StoreBackend},
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    services::{
        problem_catalog::ProblemCatalog,
        progress_store::{MemoryProgressStore, ProgressStore},
        step_checker::{HeuristicChecker, StepChecker},
        AppState,
    },
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";

pub fn test_config() -> Config {
    Config {
        bind_addr: "127.0.0.1:0".to_string(),
        // Nothing listens on the discard port
        recognition_url: "http://127.0.0.1:9/recognize".to_string(),
        mathpix_app_id: None,
        mathpix_app_key: None,
        judge_mode: JudgeMode::Heuristic,
        judge_url: None,
        judge_timeout_secs: None,
        session_idle_secs: 1800,
        store_backend: StoreBackend::Memory,
        store_url: None,
        store_service_key: None,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_audience: None,
        problems_path: "./data/final_tagged_ranked.jsonl".to_string(),
        canvas: CanvasConfig::default(),
        llm: LlmConfig {
            api_key: None,
            api_endpoint: "http://127.0.0.1:9/v1".to_string(),
            skill_model: "test".to_string(),
            diff_model: "test".to_string(),
        },
        enrich: EnrichConfig {
            data_dir: std::env::temp_dir().display().to_string(),
            max_workers_skill: 2,
            max_workers_diff: 2,
            skill_batch_size: 10,
            retry_limit: 1,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Memory store, heuristic judge, demo problem only.
pub fn create_test_app() -> TestApp {
    create_test_app_with(
        test_config(),
        Arc::new(MemoryProgressStore::new()),
        Arc::new(HeuristicChecker::new()),
    )
}

pub fn create_test_app_with(
    config: Config,
    store: Arc<dyn ProgressStore>,
    checker: Arc<dyn StepChecker>,
) -> TestApp {
    init_tracing();

    let catalog = Arc::new(ProblemCatalog::from_problems(Vec::new()));
    let state = Arc::new(
        AppState::with_parts(config, store, checker, "heuristic", catalog)
            .expect("Failed to initialize test app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

pub fn token_for(user_id: &str, role: Option<&str>) -> String {
    let now = chrono::Utc::now().timestamp();
    JwtService::new(TEST_JWT_SECRET, None)
        .generate_token(&JwtClaims {
            sub: user_id.to_string(),
            role: role.map(str::to_string),
            email: None,
            exp: (now + 3600) as usize,
            iat: now as usize,
        })
        .expect("token")
}

/// Sends a request and returns the status with the JSON body (Null when
/// the body is empty or not JSON).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
