use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod canvas;
pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Browser clients post ink images to /recognize directly
    let recognize_cors = CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .route(
            "/recognize",
            post(handlers::recognition::recognize).layer(recognize_cors),
        )
        .nest(
            "/api/v1",
            api_routes().layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/problems", problems_routes())
        .nest("/sessions", sessions_routes())
        .route("/activity", get(handlers::activity::get_activity))
        .route("/profile", get(handlers::activity::get_profile))
}

fn problems_routes() -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/reload", post(handlers::problems::reload_problems))
        .layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ));

    Router::new()
        .route("/", get(handlers::problems::list_problems))
        .route("/{id}", get(handlers::problems::get_problem))
        .merge(admin)
}

fn sessions_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(handlers::sessions::open_session))
        .route(
            "/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::close_session),
        )
        .route("/{id}/steps", post(handlers::sessions::submit_step))
        .route("/{id}/undo", post(handlers::sessions::undo_step))
}
