//! Moderation queue, approvals and flags

use auth::Capability;
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, require_auth, require_capability},
    models::{Flag, Video},
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/queue", get(queue))
        .route("/approve/:id", post(approve))
        .route("/reject/:id", post(reject))
        .route("/flags", get(flags))
        .route("/flags/:flag_id/resolve", post(resolve_flag))
        .route_layer(middleware::from_fn_with_state(
            Capability::Moderate,
            require_capability,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

pub async fn queue(State(state): State<AppState>) -> ApiResult<Json<Vec<Video>>> {
    Ok(Json(state.videos.moderation_queue().await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveRequest {
    /// Tag ids or names; unknown names are created
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ApproveRequest>,
) -> ApiResult<impl IntoResponse> {
    state.moderation.approve(id, user.id, &payload.tags).await?;
    Ok(Json(json!({ "message": "Video approved" })))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectRequest>,
) -> ApiResult<impl IntoResponse> {
    let reason = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ApiError::Validation("A rejection reason is required".to_string()))?;

    state.moderation.reject(id, user.id, reason).await?;
    Ok(Json(json!({ "message": "Video rejected" })))
}

pub async fn flags(State(state): State<AppState>) -> ApiResult<Json<Vec<Flag>>> {
    Ok(Json(state.moderation.pending_flags().await?))
}

pub async fn resolve_flag(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(flag_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if !state.moderation.resolve_flag(flag_id, user.id).await? {
        return Err(ApiError::NotFound("Pending flag not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
