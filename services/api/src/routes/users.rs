//! Follows and public uploader profiles

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, optional_auth, require_auth},
    models::ListQuery,
    policy::ListingScope,
    repositories::{Feed, FollowStatus},
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/:id/videos", get(uploader_videos))
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    let protected = Router::new()
        .route("/follow-requests", get(follow_requests))
        .route("/follow-requests/:follower_id", put(respond_to_follow))
        .route("/:id/follow", post(follow_user))
        .route("/:id/unfollow", post(unfollow_user))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    public.merge(protected)
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// One uploader's approved videos, filtered like every other listing
pub async fn uploader_videos(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let uploader = state
        .auth
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;

    let viewer = auth.as_ref().map(|Extension(AuthUser(user))| user);
    let scope = ListingScope::for_viewer(viewer, &state.policy_facts()).await?;
    let page = state.videos.list(&scope, Feed::Uploader(id), &query).await?;

    let is_following = match viewer {
        Some(v) if v.id != id => state.follows.is_approved(v.id, id).await?,
        _ => false,
    };

    Ok(Json(json!({
        "user": {
            "id": uploader.id,
            "username": uploader.username,
            "role": uploader.role,
            "created_at": uploader.created_at,
        },
        "is_following": is_following,
        "videos": page,
    })))
}

pub async fn follow_user(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if id == user.id {
        return Err(ApiError::BadRequest("Cannot follow yourself".to_string()));
    }

    let target = state
        .auth
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(user_not_found)?;

    let status = state.follows.follow(user.id, &target).await?;
    let message = match status {
        FollowStatus::Pending => "Follow request sent",
        FollowStatus::Approved => "Now following",
    };

    Ok(Json(json!({ "status": status, "message": message })))
}

pub async fn unfollow_user(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.follows.unfollow(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn follow_requests(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.follows.pending_requests(user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Deserialize)]
pub struct FollowDecisionRequest {
    pub status: FollowDecision,
}

pub async fn respond_to_follow(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(follower_id): Path<Uuid>,
    Json(payload): Json<FollowDecisionRequest>,
) -> ApiResult<StatusCode> {
    let approve = matches!(payload.status, FollowDecision::Approved);

    if !state.follows.respond(user.id, follower_id, approve).await? {
        return Err(ApiError::NotFound("Follow request not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
