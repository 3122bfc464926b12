//! Bearer authentication and capability guards

use auth::{Capability, User};
use axum::{
    Extension,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::debug;

use crate::{error::ApiError, state::AppState};

/// Authenticated user, reloaded from the store for every request
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

type BearerHeader = TypedHeader<Authorization<Bearer>>;

/// Reject requests without a valid bearer token
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?;

    let user = state.auth.authenticate(bearer.token()).await?;
    req.extensions_mut().insert(AuthUser(user));

    Ok(next.run(req).await)
}

/// Attach the user when a valid token is present; anything else is anonymous
pub async fn optional_auth(
    State(state): State<AppState>,
    bearer: Option<BearerHeader>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(TypedHeader(Authorization(bearer))) = bearer {
        match state.auth.authenticate(bearer.token()).await {
            Ok(user) => {
                req.extensions_mut().insert(AuthUser(user));
            }
            Err(e) => debug!("Continuing anonymously: {}", e),
        }
    }

    next.run(req).await
}

/// Guard for routes that need `capability`; runs after `require_auth`
pub async fn require_capability(
    State(capability): State<Capability>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.role.has_capability(capability) {
        return Err(ApiError::Forbidden("Insufficient permissions".to_string()));
    }

    Ok(next.run(req).await)
}
