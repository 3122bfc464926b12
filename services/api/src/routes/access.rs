//! Allowlist management for `username_only` videos
//!
//! Mounted inside the authenticated video routes. Only the uploader or a
//! user with `ManageAnyVideo` may change who can see a video.

use auth::{Capability, validation::validate_username};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::AccessMode,
    routes::videos::load_owned,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:id/access", get(list_access).post(grant_access))
        .route("/:id/access/:username", delete(revoke_access))
        .route("/:id/access-mode", put(set_access_mode))
}

pub async fn list_access(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let video = load_owned(&state, id, &user, Capability::ManageAnyVideo).await?;
    let grants = state.access.list(id).await?;

    Ok(Json(json!({
        "access_mode": video.access_mode,
        "single_username": video.single_username,
        "grants": grants,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub username: String,
}

pub async fn grant_access(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<GrantRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = payload.username.trim();
    validate_username(username).map_err(ApiError::Validation)?;

    load_owned(&state, id, &user, Capability::ManageAnyVideo).await?;

    let created = state.access.grant(id, username, user.id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(json!({ "username": username, "granted": true })),
    ))
}

pub async fn revoke_access(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path((id, username)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    load_owned(&state, id, &user, Capability::ManageAnyVideo).await?;

    if !state.access.revoke(id, &username).await? {
        return Err(ApiError::NotFound("Access grant not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct AccessModeRequest {
    pub access_mode: String,
    pub single_username: Option<String>,
}

/// Parse and validate a mode change before anything is written
pub fn parse_access_mode(payload: &AccessModeRequest) -> ApiResult<(AccessMode, Option<String>)> {
    let mode: AccessMode = payload.access_mode.trim().parse()?;

    let single_username = match mode {
        AccessMode::UsernameOnly => payload
            .single_username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                validate_username(name)
                    .map(|_| name.to_string())
                    .map_err(ApiError::Validation)
            })
            .transpose()?,
        _ => None,
    };

    Ok((mode, single_username))
}

pub async fn set_access_mode(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccessModeRequest>,
) -> ApiResult<impl IntoResponse> {
    let (mode, single_username) = parse_access_mode(&payload)?;

    load_owned(&state, id, &user, Capability::ManageAnyVideo).await?;

    if !state
        .videos
        .set_access_mode(id, mode, single_username.as_deref())
        .await?
    {
        return Err(ApiError::video_not_found());
    }

    Ok(Json(json!({
        "access_mode": mode,
        "single_username": single_username,
    })))
}
