//! Payment provider webhooks
//!
//! Trusted callers; the subscription id must match a checkout this service
//! created, so a fabricated id never creates a membership.

use axum::{Json, Router, extract::State, routing::post};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/membership/renewal", post(membership_renewal))
        .route("/membership/expiration", post(membership_expiration))
}

#[derive(Debug, Default, Deserialize)]
pub struct MembershipWebhook {
    pub provider_subscription_id: Option<String>,
    pub provider: Option<String>,
    pub amount_cents: Option<i32>,
}

impl MembershipWebhook {
    fn subscription_id(&self) -> ApiResult<&str> {
        self.provider_subscription_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("provider_subscription_id is required".to_string()))
    }
}

pub async fn membership_renewal(
    State(state): State<AppState>,
    Json(payload): Json<MembershipWebhook>,
) -> ApiResult<Json<Value>> {
    let subscription_id = payload.subscription_id()?;
    let membership = state
        .membership
        .confirm_renewal(subscription_id, payload.provider.clone(), payload.amount_cents)
        .await?;

    Ok(Json(json!({ "success": true, "membership": membership })))
}

pub async fn membership_expiration(
    State(state): State<AppState>,
    Json(payload): Json<MembershipWebhook>,
) -> ApiResult<Json<Value>> {
    let subscription_id = payload.subscription_id()?;
    let membership = state.membership.confirm_expiration(subscription_id).await?;

    Ok(Json(json!({ "success": true, "membership": membership })))
}
