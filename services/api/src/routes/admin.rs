//! Platform administration: users, settings, audit trail and removal requests

use auth::{Capability, Role, UserResponse};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::{Duration, Utc};
use common::background::spawn_best_effort;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{AuthUser, require_auth, require_capability},
    models::{AuditLog, Pagination, RemovalRequest, RemovalStatus},
    repositories::{AuditEntry, PlatformStats},
    state::AppState,
};

/// Bans without a duration last this long
const PERMANENT_BAN_YEARS: i64 = 100;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(stats))
        .route("/users", get(list_users))
        .route("/users/:id/role", put(set_role))
        .route("/users/:id/ban", post(ban_user))
        .route("/users/:id/unban", post(unban_user))
        .route("/audit-logs", get(audit_logs))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/removal-requests", get(removal_requests))
        .route("/removal-requests/:id/process", post(process_removal))
        .route_layer(middleware::from_fn_with_state(
            Capability::Administer,
            require_capability,
        ))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

fn audit(state: &AppState, entry: AuditEntry) {
    let audit = state.audit.clone();
    spawn_best_effort("audit", async move { audit.record(entry).await });
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<PlatformStats>> {
    Ok(Json(state.moderation.stats().await?))
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<Pagination>,
) -> ApiResult<impl IntoResponse> {
    let users = state.auth.users().list(i64::from(query.limit()), query.offset()).await?;
    let total = state.auth.users().count().await?;

    let users: Vec<Value> = users
        .iter()
        .map(|u| {
            json!({
                "user": UserResponse::from(u),
                "banned_until": u.banned_until,
                "ban_reason": u.ban_reason,
            })
        })
        .collect();

    Ok(Json(json!({
        "users": users,
        "page": query.page(),
        "limit": query.limit(),
        "total": total,
    })))
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: String,
}

pub async fn set_role(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoleRequest>,
) -> ApiResult<Json<UserResponse>> {
    let role: Role = payload.role.parse().map_err(ApiError::Validation)?;

    let user = state
        .auth
        .users()
        .set_role(id, role)
        .await?
        .ok_or_else(user_not_found)?;

    audit(
        &state,
        AuditEntry::new(
            Some(admin.id),
            "update_role",
            "user",
            id,
            json!({ "role": role.as_str() }),
        ),
    );

    Ok(Json(UserResponse::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    /// Omitted for a permanent ban
    pub duration_hours: Option<i64>,
    pub reason: Option<String>,
}

pub async fn ban_user(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BanRequest>,
) -> ApiResult<impl IntoResponse> {
    if id == admin.id {
        return Err(ApiError::BadRequest("Cannot ban yourself".to_string()));
    }

    let until = ban_until(payload.duration_hours)?;
    let reason = payload.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());

    let user = state
        .auth
        .users()
        .ban(id, until, reason)
        .await?
        .ok_or_else(user_not_found)?;

    audit(
        &state,
        AuditEntry::new(
            Some(admin.id),
            "ban_user",
            "user",
            id,
            json!({ "until": until, "reason": reason }),
        ),
    );

    Ok(Json(json!({
        "message": "User banned",
        "user_id": user.id,
        "banned_until": user.banned_until,
    })))
}

fn ban_until(duration_hours: Option<i64>) -> ApiResult<chrono::DateTime<Utc>> {
    match duration_hours {
        None => Ok(Utc::now() + Duration::days(365 * PERMANENT_BAN_YEARS)),
        Some(hours) if hours > 0 => Ok(Utc::now() + Duration::hours(hours)),
        Some(_) => Err(ApiError::Validation(
            "duration_hours must be positive".to_string(),
        )),
    }
}

pub async fn unban_user(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state
        .auth
        .users()
        .unban(id)
        .await?
        .ok_or_else(user_not_found)?;

    audit(
        &state,
        AuditEntry::new(Some(admin.id), "unban_user", "user", id, json!({})),
    );

    Ok(Json(json!({ "message": "User unbanned" })))
}

pub async fn audit_logs(
    State(state): State<AppState>,
    Query(query): Query<Pagination>,
) -> ApiResult<Json<Vec<AuditLog>>> {
    Ok(Json(state.audit.list(i64::from(query.limit()), query.offset()).await?))
}

pub async fn get_settings(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let settings: Map<String, Value> = state
        .settings
        .get_all()
        .await?
        .into_iter()
        .map(|s| (s.key, s.value))
        .collect();

    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Json(payload): Json<Map<String, Value>>,
) -> ApiResult<impl IntoResponse> {
    state.settings.upsert_all(&payload).await?;

    audit(
        &state,
        AuditEntry {
            actor_id: Some(admin.id),
            action: "update_settings",
            entity_type: "settings",
            entity_id: None,
            details: Value::Object(payload),
        },
    );

    Ok(Json(json!({ "message": "Settings updated" })))
}

#[derive(Debug, Default, Deserialize)]
pub struct RemovalFilter {
    pub status: Option<RemovalStatus>,
}

pub async fn removal_requests(
    State(state): State<AppState>,
    Query(filter): Query<RemovalFilter>,
) -> ApiResult<Json<Vec<RemovalRequest>>> {
    let status = filter.status.unwrap_or(RemovalStatus::Pending);
    Ok(Json(state.removals.list(status).await?))
}

#[derive(Debug, Deserialize)]
pub struct ProcessRemovalRequest {
    pub status: RemovalStatus,
    pub admin_notes: Option<String>,
}

pub async fn process_removal(
    State(state): State<AppState>,
    Extension(AuthUser(admin)): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProcessRemovalRequest>,
) -> ApiResult<impl IntoResponse> {
    let approve = match payload.status {
        RemovalStatus::Approved => true,
        RemovalStatus::Rejected => false,
        RemovalStatus::Pending => {
            return Err(ApiError::Validation(
                "status must be approved or rejected".to_string(),
            ));
        }
    };

    let video_id = state
        .removals
        .process(id, admin.id, approve, payload.admin_notes.as_deref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Pending removal request not found".to_string()))?;

    Ok(Json(json!({
        "message": "Removal request processed",
        "video_id": video_id,
        "status": payload.status,
    })))
}
