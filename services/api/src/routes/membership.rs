//! Membership checkout and status

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::ApiResult,
    middleware::{AuthUser, require_auth},
    models::MembershipStatus,
    state::AppState,
};

pub fn router(state: AppState) -> Router<AppState> {
    let mut router = Router::new()
        .route("/checkout", post(checkout))
        .route("/status", get(status));

    // Completes a checkout without a payment provider
    if !state.config.is_production() {
        warn!("Membership dev completion endpoint enabled");
        router = router.route("/dev/complete", post(dev_complete));
    }

    router.route_layer(middleware::from_fn_with_state(state, require_auth))
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    pub provider: Option<String>,
    pub amount_cents: Option<i32>,
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(payload): Json<CheckoutRequest>,
) -> ApiResult<impl IntoResponse> {
    let checkout = state
        .membership
        .start_checkout(user.id, payload.provider, payload.amount_cents)
        .await?;

    Ok((StatusCode::CREATED, Json(checkout)))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> ApiResult<Json<MembershipStatus>> {
    Ok(Json(state.membership.status(user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct DevCompleteRequest {
    pub provider_subscription_id: String,
}

/// Activate one of the caller's own pending checkouts
pub async fn dev_complete(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(payload): Json<DevCompleteRequest>,
) -> ApiResult<impl IntoResponse> {
    let membership = state
        .membership
        .confirm_renewal_for(user.id, &payload.provider_subscription_id)
        .await?;

    Ok(Json(membership))
}
