//! Registration and login

use auth::{LoginCredentials, NewUser, UserResponse};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tracing::info;

use crate::{
    error::ApiResult,
    middleware::{AuthUser, require_auth},
    state::AppState,
};

/// Response for a successful login
#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: UserResponse,
}

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(protected)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.register(&payload).await?;
    info!("Registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginCredentials>,
) -> ApiResult<Json<LoginResponse>> {
    let issued = state.auth.login(&payload).await?;

    Ok(Json(LoginResponse {
        token: issued.access_token,
        token_type: "Bearer",
        expires_in: issued.expires_in,
        user: UserResponse::from(&issued.user),
    }))
}

pub async fn me(Extension(AuthUser(user)): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}
