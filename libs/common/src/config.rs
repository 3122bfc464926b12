//! Application configuration
//!
//! Settings are layered: built-in defaults first, then environment variables
//! (`SERVER_ADDR`, `UPLOAD_DIR`, `MEMBERSHIP_DURATION_DAYS`, ...). Database
//! and JWT settings keep their own `from_env` constructors.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Deployment environment, mirrors `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

/// Top level application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server binds to
    pub server_addr: String,
    /// Deployment environment
    pub app_env: AppEnv,
    /// Allowed CORS origin for the web client
    pub client_url: String,
    /// Directory uploaded videos and thumbnails are written to
    pub upload_dir: String,
    /// URL prefix uploaded files are served under
    pub public_upload_prefix: String,
    /// Largest accepted upload body in bytes
    pub max_upload_bytes: usize,
    /// Length of a paid membership window
    pub membership_duration_days: i64,
    /// Price charged when the client does not send one
    pub membership_price_cents: i32,
    /// Payment provider recorded on new memberships
    pub membership_provider: String,
    /// Mock checkout page the client is redirected to
    pub membership_checkout_url: String,
}

impl AppConfig {
    /// Load configuration from defaults and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(Environment::default().try_parsing(true))
    }

    fn from_source(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server_addr", "0.0.0.0:5000")?
            .set_default("app_env", "development")?
            .set_default("client_url", "http://localhost:5173")?
            .set_default("upload_dir", "./uploads")?
            .set_default("public_upload_prefix", "/uploads")?
            .set_default("max_upload_bytes", 500_i64 * 1024 * 1024)?
            .set_default("membership_duration_days", 30)?
            .set_default("membership_price_cents", 500)?
            .set_default("membership_provider", "paypal")?
            .set_default(
                "membership_checkout_url",
                "https://payments.mock/membership",
            )?
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// True when running with `APP_ENV=production`
    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults() {
        let config = AppConfig::from_source(Environment::with_prefix("CLIPVAULT_TEST_UNSET"))
            .expect("defaults should deserialize");

        assert_eq!(config.server_addr, "0.0.0.0:5000");
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.membership_duration_days, 30);
        assert_eq!(config.membership_price_cents, 500);
        assert_eq!(config.membership_provider, "paypal");
        assert_eq!(config.max_upload_bytes, 500 * 1024 * 1024);
        assert!(!config.is_production());
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("CVTEST_APP_ENV", "production");
            std::env::set_var("CVTEST_MEMBERSHIP_DURATION_DAYS", "7");
        }

        let config = AppConfig::from_source(
            Environment::with_prefix("CVTEST")
                .prefix_separator("_")
                .try_parsing(true),
        )
        .expect("overrides should deserialize");

        assert!(config.is_production());
        assert_eq!(config.membership_duration_days, 7);

        unsafe {
            std::env::remove_var("CVTEST_APP_ENV");
            std::env::remove_var("CVTEST_MEMBERSHIP_DURATION_DAYS");
        }
    }
}
