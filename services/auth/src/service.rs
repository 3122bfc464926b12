//! Registration, login and bearer-token authentication

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    error::{AuthError, AuthResult},
    jwt::JwtService,
    models::{LoginCredentials, NewUser, User},
    rate_limiter::RateLimiter,
    repositories::UserRepository,
    validation::validate_registration,
};

/// Token issued after a successful login
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: u64,
    pub user: User,
}

/// Identity operations shared by the HTTP layer
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    jwt: JwtService,
    limiter: RateLimiter,
}

impl AuthService {
    pub fn new(users: UserRepository, jwt: JwtService, limiter: RateLimiter) -> Self {
        Self {
            users,
            jwt,
            limiter,
        }
    }

    pub fn users(&self) -> &UserRepository {
        &self.users
    }

    /// Validate and create an account
    pub async fn register(&self, new_user: &NewUser) -> AuthResult<User> {
        validate_registration(new_user)?;
        self.users.create(new_user).await
    }

    /// Check credentials and issue a bearer token
    pub async fn login(&self, credentials: &LoginCredentials) -> AuthResult<IssuedToken> {
        if !self.limiter.is_allowed(&credentials.email).await {
            warn!("Login throttled for {}", credentials.email);
            return Err(AuthError::RateLimited);
        }

        let user = self
            .users
            .find_by_email(&credentials.email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.users.verify_password(&user, &credentials.password)? {
            return Err(AuthError::InvalidCredentials);
        }

        if user.is_banned_at(Utc::now()) {
            return Err(AuthError::Suspended);
        }

        self.limiter.reset(&credentials.email).await;
        info!("User {} logged in", user.id);

        Ok(IssuedToken {
            access_token: self.jwt.generate_token(&user)?,
            expires_in: self.jwt.expiry_seconds(),
            user,
        })
    }

    /// Resolve a bearer token to the current state of its user
    ///
    /// The user row is reloaded so role and ban changes apply to tokens
    /// issued before the change.
    pub async fn authenticate(&self, token: &str) -> AuthResult<User> {
        let claims = self.jwt.validate_token(token)?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AuthError::Token("Unknown subject".to_string()))?;

        if user.is_banned_at(Utc::now()) {
            return Err(AuthError::Suspended);
        }

        Ok(user)
    }
}
