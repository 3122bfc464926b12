//! Moderation writes: approvals, rejections and flags
//!
//! Each operation runs in one transaction together with its audit row.

use serde::Serialize;
use serde_json::json;
use sqlx::{PgConnection, PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{Flag, VideoStatus},
    repositories::{
        audit::{AuditEntry, record_on},
        settings::auto_unpublish_threshold_on,
        video::transition_on,
    },
};

/// How a tag was named in an approval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagRef {
    Existing(Uuid),
    Named(String),
}

impl TagRef {
    /// UUID strings refer to existing tags; anything else is a name.
    /// Blank entries are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match Uuid::parse_str(raw) {
            Ok(id) => TagRef::Existing(id),
            Err(_) => TagRef::Named(raw.to_lowercase()),
        })
    }
}

/// Result of filing a flag
#[derive(Debug, Clone, Serialize)]
pub struct FlagOutcome {
    pub flag_id: Uuid,
    /// Distinct reporters with a pending flag on the video
    pub flag_count: i64,
    pub threshold: i64,
    pub auto_unpublished: bool,
}

/// Dashboard counters
#[derive(Debug, Clone, Serialize)]
pub struct PlatformStats {
    pub users: i64,
    pub videos: i64,
    pub pending_videos: i64,
    pub pending_flags: i64,
}

#[derive(Clone)]
pub struct ModerationRepository {
    pool: PgPool,
}

impl ModerationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Approve a video, attach its tags and record the decision
    pub async fn approve(&self, video_id: Uuid, moderator_id: Uuid, tags: &[String]) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        transition_on(&mut tx, video_id, VideoStatus::Approved, None).await?;

        let mut tag_ids = Vec::new();
        for tag in tags.iter().filter_map(|raw| TagRef::parse(raw)) {
            let tag_id = resolve_tag(&mut tx, &tag, moderator_id).await?;
            if !tag_ids.contains(&tag_id) {
                tag_ids.push(tag_id);
            }
        }

        for tag_id in &tag_ids {
            sqlx::query(
                "INSERT INTO video_tags (video_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(video_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }

        record_on(
            &mut tx,
            &AuditEntry::new(
                Some(moderator_id),
                "approve",
                "video",
                video_id,
                json!({ "tags": tag_ids }),
            ),
        )
        .await?;

        tx.commit().await?;

        info!("Video {} approved by {}", video_id, moderator_id);
        Ok(())
    }

    pub async fn reject(&self, video_id: Uuid, moderator_id: Uuid, reason: &str) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        transition_on(&mut tx, video_id, VideoStatus::Rejected, Some(reason)).await?;
        record_on(
            &mut tx,
            &AuditEntry::new(
                Some(moderator_id),
                "reject",
                "video",
                video_id,
                json!({ "reason": reason }),
            ),
        )
        .await?;

        tx.commit().await?;

        info!("Video {} rejected by {}", video_id, moderator_id);
        Ok(())
    }

    /// File a flag and unpublish the video once enough distinct users have
    /// flagged it. Only an approved video is unpublished, so flags arriving
    /// after the transition do not trigger again.
    pub async fn flag(
        &self,
        video_id: Uuid,
        reporter_id: Uuid,
        reason: &str,
        description: Option<&str>,
    ) -> ApiResult<FlagOutcome> {
        let mut tx = self.pool.begin().await?;

        let flag_id: Uuid = sqlx::query_scalar(
            "INSERT INTO flags (video_id, reporter_id, reason, description) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(video_id)
        .bind(reporter_id)
        .bind(reason)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        let flag_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT reporter_id) FROM flags WHERE video_id = $1 AND status = 'pending'",
        )
        .bind(video_id)
        .fetch_one(&mut *tx)
        .await?;

        let threshold = auto_unpublish_threshold_on(&mut tx).await?;

        let mut auto_unpublished = false;
        if flag_count >= threshold {
            let moved = sqlx::query(
                "UPDATE videos SET status = 'pending_approval', updated_at = NOW() \
                 WHERE id = $1 AND status = 'approved'",
            )
            .bind(video_id)
            .execute(&mut *tx)
            .await?;

            if moved.rows_affected() > 0 {
                auto_unpublished = true;
                record_on(
                    &mut tx,
                    &AuditEntry::new(
                        None,
                        "auto_unpublish",
                        "video",
                        video_id,
                        json!({ "flag_count": flag_count, "threshold": threshold }),
                    ),
                )
                .await?;
            }
        }

        tx.commit().await?;

        if auto_unpublished {
            info!(
                "Video {} unpublished after {} flags",
                video_id, flag_count
            );
        }

        Ok(FlagOutcome {
            flag_id,
            flag_count,
            threshold,
            auto_unpublished,
        })
    }

    /// Pending flags, newest first
    pub async fn pending_flags(&self) -> ApiResult<Vec<Flag>> {
        let rows = sqlx::query(
            r#"
            SELECT f.id, f.video_id, v.title AS video_title, f.reporter_id,
                   u.username AS reporter_name, f.reason, f.description, f.status,
                   (SELECT COUNT(*) FROM flags f2
                    WHERE f2.video_id = f.video_id AND f2.status = 'pending') AS flag_count,
                   f.created_at
            FROM flags f
            LEFT JOIN videos v ON v.id = f.video_id
            LEFT JOIN users u ON u.id = f.reporter_id
            WHERE f.status = 'pending'
            ORDER BY f.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Flag {
                id: row.get("id"),
                video_id: row.get("video_id"),
                video_title: row.get("video_title"),
                reporter_id: row.get("reporter_id"),
                reporter_name: row.get("reporter_name"),
                reason: row.get("reason"),
                description: row.get("description"),
                status: row.get("status"),
                flag_count: row.get("flag_count"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    pub async fn resolve_flag(&self, flag_id: Uuid, moderator_id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE flags SET status = 'resolved', reviewed_by = $2, reviewed_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(flag_id)
        .bind(moderator_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self) -> ApiResult<PlatformStats> {
        let row = sqlx::query(
            r#"
            SELECT (SELECT COUNT(*) FROM users) AS users,
                   (SELECT COUNT(*) FROM videos) AS videos,
                   (SELECT COUNT(*) FROM videos WHERE status = 'pending_approval') AS pending_videos,
                   (SELECT COUNT(*) FROM flags WHERE status = 'pending') AS pending_flags
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(PlatformStats {
            users: row.get("users"),
            videos: row.get("videos"),
            pending_videos: row.get("pending_videos"),
            pending_flags: row.get("pending_flags"),
        })
    }
}

async fn resolve_tag(conn: &mut PgConnection, tag: &TagRef, created_by: Uuid) -> ApiResult<Uuid> {
    match tag {
        TagRef::Existing(id) => {
            let found: Option<Uuid> = sqlx::query_scalar("SELECT id FROM tags WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            found.ok_or_else(|| ApiError::Validation(format!("Unknown tag: {}", id)))
        }
        TagRef::Named(name) => {
            let id: Uuid = sqlx::query_scalar(
                "INSERT INTO tags (name, created_by) VALUES ($1, $2) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
            )
            .bind(name)
            .bind(created_by)
            .fetch_one(&mut *conn)
            .await?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_refs() {
        let id = Uuid::new_v4();
        assert_eq!(TagRef::parse(&id.to_string()), Some(TagRef::Existing(id)));
        assert_eq!(
            TagRef::parse("  Funny "),
            Some(TagRef::Named("funny".to_string()))
        );
        assert_eq!(TagRef::parse("   "), None);
    }
}
