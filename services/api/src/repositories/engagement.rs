//! Ratings, favorites, watch history and comments

use serde::Serialize;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    models::{Comment, RatingCounts},
};

/// Rows kept per user in the watch history
pub const HISTORY_LIMIT: i64 = 25;

/// Outcome of a rating toggle
#[derive(Debug, Clone, Serialize)]
pub struct RatingOutcome {
    #[serde(flatten)]
    pub counts: RatingCounts,
    /// Rating left in place after the toggle: 1, -1 or none
    pub user_rating: Option<i16>,
}

/// Who may delete a comment
#[derive(Debug, Clone, Copy)]
pub struct CommentOwnership {
    pub author_id: Uuid,
    pub uploader_id: Uuid,
}

#[derive(Clone)]
pub struct EngagementRepository {
    pool: PgPool,
}

impl EngagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Toggle a like or dislike and recount the video's totals.
    ///
    /// Repeating the same rating removes it; the opposite rating replaces it.
    pub async fn rate(&self, video_id: Uuid, user_id: Uuid, is_like: bool) -> ApiResult<RatingOutcome> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<bool> = sqlx::query_scalar(
            "SELECT is_like FROM video_ratings WHERE video_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(video_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let user_rating = match existing {
            Some(previous) if previous == is_like => {
                sqlx::query("DELETE FROM video_ratings WHERE video_id = $1 AND user_id = $2")
                    .bind(video_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                None
            }
            _ => {
                sqlx::query(
                    "INSERT INTO video_ratings (video_id, user_id, is_like) VALUES ($1, $2, $3) \
                     ON CONFLICT (video_id, user_id) DO UPDATE SET is_like = EXCLUDED.is_like",
                )
                .bind(video_id)
                .bind(user_id)
                .bind(is_like)
                .execute(&mut *tx)
                .await?;
                Some(if is_like { 1 } else { -1 })
            }
        };

        let row = sqlx::query(
            r#"
            UPDATE videos
            SET likes_count = (SELECT COUNT(*) FROM video_ratings WHERE video_id = $1 AND is_like),
                dislikes_count = (SELECT COUNT(*) FROM video_ratings WHERE video_id = $1 AND NOT is_like)
            WHERE id = $1
            RETURNING likes_count, dislikes_count
            "#,
        )
        .bind(video_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(RatingOutcome {
            counts: RatingCounts {
                likes: row.get("likes_count"),
                dislikes: row.get("dislikes_count"),
            },
            user_rating,
        })
    }

    /// Toggle a favorite; returns whether the video is now a favorite
    pub async fn toggle_favorite(&self, user_id: Uuid, video_id: Uuid) -> ApiResult<bool> {
        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND video_id = $2")
            .bind(user_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;

        if removed.rows_affected() > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO favorites (user_id, video_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(video_id)
        .execute(&self.pool)
        .await?;

        Ok(true)
    }

    /// Record a view and keep only the newest `HISTORY_LIMIT` rows
    pub async fn record_history(&self, user_id: Uuid, video_id: Uuid) -> ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO watch_history (user_id, video_id, watched_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id, video_id) DO UPDATE SET watched_at = NOW()",
        )
        .bind(user_id)
        .bind(video_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM watch_history
            WHERE user_id = $1 AND video_id NOT IN (
                SELECT video_id FROM watch_history
                WHERE user_id = $1
                ORDER BY watched_at DESC
                LIMIT $2
            )
            "#,
        )
        .bind(user_id)
        .bind(HISTORY_LIMIT)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_history(&self, user_id: Uuid, video_id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM watch_history WHERE user_id = $1 AND video_id = $2")
            .bind(user_id)
            .bind(video_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_history(&self, user_id: Uuid) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM watch_history WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Comments on a video, newest first
    pub async fn comments(&self, video_id: Uuid) -> ApiResult<Vec<Comment>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.video_id, c.user_id, u.username, c.content, c.created_at
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.video_id = $1
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(video_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(comment_from_row).collect())
    }

    /// Store an already validated comment
    pub async fn add_comment(&self, video_id: Uuid, user_id: Uuid, content: &str) -> ApiResult<Comment> {
        let row = sqlx::query(
            r#"
            WITH inserted AS (
                INSERT INTO comments (video_id, user_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, video_id, user_id, content, created_at
            )
            SELECT i.id, i.video_id, i.user_id, u.username, i.content, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(video_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(comment_from_row(&row))
    }

    pub async fn comment_ownership(&self, comment_id: Uuid) -> ApiResult<Option<CommentOwnership>> {
        let row = sqlx::query(
            "SELECT c.user_id, v.uploader_id FROM comments c \
             JOIN videos v ON v.id = c.video_id WHERE c.id = $1",
        )
        .bind(comment_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| CommentOwnership {
            author_id: row.get("user_id"),
            uploader_id: row.get("uploader_id"),
        }))
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn comment_from_row(row: &sqlx::postgres::PgRow) -> Comment {
    Comment {
        id: row.get("id"),
        video_id: row.get("video_id"),
        user_id: row.get("user_id"),
        username: row.get("username"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}
