//! API route definitions

use std::sync::Arc;
use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "message": "Not found. Visit / for the dashboard or /health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "message": "Method not allowed.",
        })),
    )
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow = match origin {
        Some(origin) if !origin.is_empty() && origin != "*" => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new().allow_origin(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Invalid CORS_ORIGIN, allowing any origin");
                CorsLayer::new().allow_origin(Any)
            }
        },
        _ => CorsLayer::new().allow_origin(Any),
    };
    allow.allow_methods(Any).allow_headers(Any)
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/", get(handlers::serve_index))
        .route("/health", get(handlers::health_check))
        .route("/features", get(handlers::get_features))
        .route("/metrics", get(handlers::get_metrics))
        .route("/predict", post(handlers::predict))
        .route("/report", get(handlers::get_report))
        .route("/eda/:name", get(handlers::get_eda))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state);

    app.layer(CompressionLayer::new())
        .layer(cors_layer(config.cors_origin.as_deref()))
        .layer(TraceLayer::new_for_http())
}
