//! JWT service for token generation and validation
//!
//! Bearer tokens are signed with HS256 using a shared secret. They carry the
//! user id, username and role; the API reloads the user on every request, so
//! the embedded role is informational only.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::{
    error::{AuthError, AuthResult},
    models::{Role, User},
};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Token lifetime in seconds (default: 24 hours)
    pub expiry_seconds: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: HMAC signing secret (required, at least 32 bytes)
    /// - `JWT_EXPIRY_SECONDS`: Token lifetime in seconds (default: 86400)
    pub fn from_env() -> AuthResult<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AuthError::Configuration("JWT_SECRET environment variable not set".into()))?;

        if secret.len() < 32 {
            return Err(AuthError::Configuration(
                "JWT_SECRET must be at least 32 bytes".into(),
            ));
        }

        let expiry_seconds = std::env::var("JWT_EXPIRY_SECONDS")
            .unwrap_or_else(|_| "86400".to_string())
            .parse()
            .unwrap_or(86400);

        Ok(JwtConfig {
            secret,
            expiry_seconds,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Username at issue time
    pub username: String,
    /// Role at issue time
    pub role: Role,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Generate an access token for a user
    pub fn generate_token(&self, user: &User) -> AuthResult<String> {
        let now = unix_now()?;

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now,
            exp: now + self.config.expiry_seconds,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Token(e.to_string()))
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AuthError::Token(e.to_string()))?;
        Ok(token_data.claims)
    }

    /// Get the token expiry time
    pub fn expiry_seconds(&self) -> u64 {
        self.config.expiry_seconds
    }
}

fn unix_now() -> AuthResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| AuthError::Token(format!("Failed to get current time: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serial_test::serial;

    const SECRET: &str = "test-secret-that-is-long-enough-for-hs256";

    fn service(expiry_seconds: u64) -> JwtService {
        JwtService::new(JwtConfig {
            secret: SECRET.to_string(),
            expiry_seconds,
        })
    }

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "creator_one".to_string(),
            email: "creator@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Creator,
            banned_until: None,
            ban_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_carries_identity() {
        let service = service(3600);
        let user = user();

        let token = service.generate_token(&user).expect("token should encode");
        let claims = service.validate_token(&token).expect("token should validate");

        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "creator_one");
        assert_eq!(claims.role, Role::Creator);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = service(3600).generate_token(&user()).unwrap();
        let other = JwtService::new(JwtConfig {
            secret: "another-secret-that-is-also-long-enough".to_string(),
            expiry_seconds: 3600,
        });

        assert!(matches!(other.validate_token(&token), Err(AuthError::Token(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let service = service(0);
        let token = service.generate_token(&user()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));

        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        assert!(service(60).validate_token("not.a.token").is_err());
    }

    #[test]
    #[serial]
    fn test_config_requires_long_secret() {
        unsafe {
            std::env::set_var("JWT_SECRET", "short");
        }
        assert!(matches!(JwtConfig::from_env(), Err(AuthError::Configuration(_))));

        unsafe {
            std::env::set_var("JWT_SECRET", SECRET);
            std::env::remove_var("JWT_EXPIRY_SECONDS");
        }
        let config = JwtConfig::from_env().expect("config should load");
        assert_eq!(config.expiry_seconds, 86400);

        unsafe {
            std::env::remove_var("JWT_SECRET");
        }
    }
}
