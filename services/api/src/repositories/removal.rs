//! Removal requests submitted by users and processed by admins

use serde_json::json;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{RemovalRequest, RemovalStatus, VideoStatus},
    repositories::{
        audit::{AuditEntry, record_on},
        video::transition_on,
    },
};

const REMOVAL_COLUMNS: &str = "r.id, r.video_id, v.title AS video_title, r.requester_id, \
     r.reason, r.description, r.status, r.admin_notes, r.processed_by, r.processed_at, \
     r.created_at";

#[derive(Clone)]
pub struct RemovalRepository {
    pool: PgPool,
}

impl RemovalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        video_id: Uuid,
        requester_id: Uuid,
        reason: &str,
        description: Option<&str>,
    ) -> ApiResult<RemovalRequest> {
        info!("Removal requested for video {}", video_id);

        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO removal_requests (video_id, requester_id, reason, description) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(video_id)
        .bind(requester_id)
        .bind(reason)
        .bind(description)
        .fetch_one(&self.pool)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM removal_requests r LEFT JOIN videos v ON v.id = r.video_id \
             WHERE r.id = $1",
            REMOVAL_COLUMNS
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(removal_from_row(&row))
    }

    /// Requests with `status`, oldest first
    pub async fn list(&self, status: RemovalStatus) -> ApiResult<Vec<RemovalRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM removal_requests r LEFT JOIN videos v ON v.id = r.video_id \
             WHERE r.status = $1 ORDER BY r.created_at ASC",
            REMOVAL_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(removal_from_row).collect())
    }

    /// Decide a pending request. Approval removes the video in the same
    /// transaction. `None` when no pending request has this id.
    pub async fn process(
        &self,
        id: Uuid,
        admin_id: Uuid,
        approve: bool,
        admin_notes: Option<&str>,
    ) -> ApiResult<Option<Uuid>> {
        let status = if approve {
            RemovalStatus::Approved
        } else {
            RemovalStatus::Rejected
        };

        let mut tx = self.pool.begin().await?;

        let video_id: Option<Uuid> = sqlx::query_scalar(
            "UPDATE removal_requests SET status = $2, admin_notes = $3, processed_by = $4, \
             processed_at = NOW() WHERE id = $1 AND status = 'pending' RETURNING video_id",
        )
        .bind(id)
        .bind(status.as_str())
        .bind(admin_notes)
        .bind(admin_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(video_id) = video_id else {
            return Ok(None);
        };

        if approve {
            transition_on(&mut tx, video_id, VideoStatus::Removed, None).await?;
        }

        record_on(
            &mut tx,
            &AuditEntry::new(
                Some(admin_id),
                "process_removal_request",
                "video",
                video_id,
                json!({ "request_id": id, "status": status.as_str(), "notes": admin_notes }),
            ),
        )
        .await?;

        tx.commit().await?;

        info!("Removal request {} {}", id, status.as_str());
        Ok(Some(video_id))
    }
}

fn removal_from_row(row: &PgRow) -> RemovalRequest {
    RemovalRequest {
        id: row.get("id"),
        video_id: row.get("video_id"),
        video_title: row.get("video_title"),
        requester_id: row.get("requester_id"),
        reason: row.get("reason"),
        description: row.get("description"),
        status: RemovalStatus::from_db(row.get("status")),
        admin_notes: row.get("admin_notes"),
        processed_by: row.get("processed_by"),
        processed_at: row.get("processed_at"),
        created_at: row.get("created_at"),
    }
}
