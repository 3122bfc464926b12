//! Audit trail of moderation and administration actions

use serde_json::Value;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::{error::ApiResult, models::AuditLog};

/// An action about to be recorded
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Option<Uuid>,
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub details: Value,
}

impl AuditEntry {
    pub fn new(
        actor_id: Option<Uuid>,
        action: &'static str,
        entity_type: &'static str,
        entity_id: Uuid,
        details: Value,
    ) -> Self {
        Self {
            actor_id,
            action,
            entity_type,
            entity_id: Some(entity_id),
            details,
        }
    }
}

/// Insert `entry` on an open connection or transaction
pub async fn record_on(conn: &mut PgConnection, entry: &AuditEntry) -> ApiResult<()> {
    sqlx::query(
        "INSERT INTO audit_logs (actor_id, action, entity_type, entity_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(entry.actor_id)
    .bind(entry.action)
    .bind(entry.entity_type)
    .bind(entry.entity_id)
    .bind(&entry.details)
    .execute(conn)
    .await?;

    Ok(())
}

#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, entry: AuditEntry) -> ApiResult<()> {
        let mut conn = self.pool.acquire().await?;
        record_on(&mut conn, &entry).await
    }

    /// Newest first
    pub async fn list(&self, limit: i64, offset: i64) -> ApiResult<Vec<AuditLog>> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.actor_id, u.username AS actor_name, a.action, a.entity_type,
                   a.entity_id, a.details, a.created_at
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.actor_id
            ORDER BY a.created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| AuditLog {
                id: row.get("id"),
                actor_id: row.get("actor_id"),
                actor_name: row.get("actor_name"),
                action: row.get("action"),
                entity_type: row.get("entity_type"),
                entity_id: row.get("entity_id"),
                details: row.get("details"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
