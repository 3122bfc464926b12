//! Persisted system settings

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool, Row};
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Flags on one video that send it back to moderation
pub const AUTO_UNPUBLISH_THRESHOLD: &str = "auto_unpublish_threshold";

pub const DEFAULT_AUTO_UNPUBLISH_THRESHOLD: i64 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Setting {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// Read a threshold stored either as a JSON number or a numeric string
pub fn parse_threshold(value: &Value) -> Option<i64> {
    let threshold = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    (threshold > 0).then_some(threshold)
}

/// Reject values that would break the settings readers
pub fn validate_setting(key: &str, value: &Value) -> ApiResult<()> {
    if key.trim().is_empty() {
        return Err(ApiError::Validation("Setting key cannot be empty".to_string()));
    }
    if key == AUTO_UNPUBLISH_THRESHOLD && parse_threshold(value).is_none() {
        return Err(ApiError::Validation(format!(
            "{} must be a positive integer",
            AUTO_UNPUBLISH_THRESHOLD
        )));
    }
    Ok(())
}

/// Current auto-unpublish threshold, read inside the caller's transaction
pub async fn auto_unpublish_threshold_on(conn: &mut PgConnection) -> ApiResult<i64> {
    let value: Option<Value> = sqlx::query_scalar("SELECT value FROM system_settings WHERE key = $1")
        .bind(AUTO_UNPUBLISH_THRESHOLD)
        .fetch_optional(conn)
        .await?;

    Ok(value
        .as_ref()
        .and_then(parse_threshold)
        .unwrap_or(DEFAULT_AUTO_UNPUBLISH_THRESHOLD))
}

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_all(&self) -> ApiResult<Vec<Setting>> {
        let rows = sqlx::query("SELECT key, value, updated_at FROM system_settings ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Setting {
                key: row.get("key"),
                value: row.get("value"),
                updated_at: row.get("updated_at"),
            })
            .collect())
    }

    /// Validate and write every pair in one transaction
    pub async fn upsert_all(&self, settings: &serde_json::Map<String, Value>) -> ApiResult<()> {
        for (key, value) in settings {
            validate_setting(key, value)?;
        }

        let mut tx = self.pool.begin().await?;
        for (key, value) in settings {
            info!("Updating setting {}", key);
            sqlx::query(
                "INSERT INTO system_settings (key, value, updated_at) VALUES ($1, $2, NOW()) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            )
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn auto_unpublish_threshold(&self) -> ApiResult<i64> {
        let mut conn = self.pool.acquire().await?;
        auto_unpublish_threshold_on(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_threshold_accepts_numbers_and_numeric_strings() {
        assert_eq!(parse_threshold(&json!(5)), Some(5));
        assert_eq!(parse_threshold(&json!(" 4 ")), Some(4));
        assert_eq!(parse_threshold(&json!(0)), None);
        assert_eq!(parse_threshold(&json!("many")), None);
        assert_eq!(parse_threshold(&json!(null)), None);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        assert!(validate_setting(AUTO_UNPUBLISH_THRESHOLD, &json!(-1)).is_err());
        assert!(validate_setting(AUTO_UNPUBLISH_THRESHOLD, &json!(2)).is_ok());
        assert!(validate_setting("site_banner", &json!({"text": "hi"})).is_ok());
        assert!(validate_setting(" ", &json!(1)).is_err());
    }
}
