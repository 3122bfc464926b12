//! API service routes
//!
//! Everything lives under `/api/v1`. Uploaded files are served statically
//! from the configured public prefix.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use serde_json::json;
use tower_http::services::ServeDir;

use crate::state::AppState;

pub mod access;
pub mod admin;
pub mod auth;
pub mod membership;
pub mod moderation;
pub mod users;
pub mod videos;
pub mod webhooks;

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health_check))
        .nest("/auth", auth::router(state.clone()))
        .nest("/videos", videos::router(state.clone()))
        .nest("/users", users::router(state.clone()))
        .nest("/membership", membership::router(state.clone()))
        .nest("/webhooks", webhooks::router())
        .nest("/moderation", moderation::router(state.clone()))
        .nest("/admin", admin::router(state.clone()));

    Router::new()
        .nest("/api/v1", api)
        .nest_service(
            &state.config.public_upload_prefix,
            ServeDir::new(&state.config.upload_dir),
        )
        .with_state(state)
}

/// Liveness plus a database round trip
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = common::database::health_check(&state.db_pool)
        .await
        .unwrap_or(false);

    let (status, label) = if database {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "api-service",
            "database": database,
        })),
    )
}
