//! Manual allowlist for `username_only` videos

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize)]
pub struct AccessGrant {
    pub id: Uuid,
    pub video_id: Uuid,
    pub username: String,
    pub granted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AccessRepository {
    pool: PgPool,
}

impl AccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, video_id: Uuid) -> ApiResult<Vec<AccessGrant>> {
        let rows = sqlx::query(
            "SELECT id, video_id, username, granted_by, created_at FROM video_access \
             WHERE video_id = $1 ORDER BY created_at ASC",
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AccessGrant {
                id: row.get("id"),
                video_id: row.get("video_id"),
                username: row.get("username"),
                granted_by: row.get("granted_by"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Grant `username` access; returns false if it already had a grant
    pub async fn grant(&self, video_id: Uuid, username: &str, granted_by: Uuid) -> ApiResult<bool> {
        info!("Granting {} access to video {}", username, video_id);

        let result = sqlx::query(
            "INSERT INTO video_access (video_id, username, granted_by) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(video_id)
        .bind(username)
        .bind(granted_by)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke(&self, video_id: Uuid, username: &str) -> ApiResult<bool> {
        info!("Revoking {} access to video {}", username, video_id);

        let result = sqlx::query(
            "DELETE FROM video_access WHERE video_id = $1 AND lower(username) = lower($2)",
        )
        .bind(video_id)
        .bind(username)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Case-insensitive grant lookup
    pub async fn exists(&self, video_id: Uuid, username: &str) -> ApiResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM video_access \
             WHERE video_id = $1 AND lower(username) = lower($2))",
        )
        .bind(video_id)
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
