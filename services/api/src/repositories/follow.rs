//! Follow relationships
//!
//! Following a creator needs the creator's approval; anyone else is followed
//! immediately.

use auth::{Role, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowStatus {
    Pending,
    Approved,
}

impl FollowStatus {
    /// Status a new follow of `target` starts in
    pub fn initial_for(target: Role) -> Self {
        if target == Role::Creator {
            FollowStatus::Pending
        } else {
            FollowStatus::Approved
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FollowStatus::Pending => "pending",
            FollowStatus::Approved => "approved",
        }
    }

    fn from_db(value: &str) -> Self {
        match value {
            "approved" => FollowStatus::Approved,
            _ => FollowStatus::Pending,
        }
    }
}

/// A follower waiting for approval
#[derive(Debug, Clone, Serialize)]
pub struct FollowRequest {
    pub follower_id: Uuid,
    pub follower_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FollowRepository {
    pool: PgPool,
}

impl FollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Follow `target`; an existing follow keeps its status
    pub async fn follow(&self, follower_id: Uuid, target: &User) -> ApiResult<FollowStatus> {
        if follower_id == target.id {
            return Err(ApiError::BadRequest("Cannot follow yourself".to_string()));
        }

        let initial = FollowStatus::initial_for(target.role);
        info!(
            "User {} follows {} ({})",
            follower_id,
            target.id,
            initial.as_str()
        );

        let status: String = sqlx::query_scalar(
            r#"
            INSERT INTO follows (follower_id, following_id, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, following_id) DO UPDATE SET status = follows.status
            RETURNING status
            "#,
        )
        .bind(follower_id)
        .bind(target.id)
        .bind(initial.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(FollowStatus::from_db(&status))
    }

    pub async fn unfollow(&self, follower_id: Uuid, following_id: Uuid) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND following_id = $2")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_approved(&self, follower_id: Uuid, following_id: Uuid) -> ApiResult<bool> {
        let approved: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM follows \
             WHERE follower_id = $1 AND following_id = $2 AND status = 'approved')",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(approved)
    }

    pub async fn pending_requests(&self, following_id: Uuid) -> ApiResult<Vec<FollowRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT f.follower_id, u.username AS follower_name, f.created_at
            FROM follows f
            JOIN users u ON u.id = f.follower_id
            WHERE f.following_id = $1 AND f.status = 'pending'
            ORDER BY f.created_at ASC
            "#,
        )
        .bind(following_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| FollowRequest {
                follower_id: row.get("follower_id"),
                follower_name: row.get("follower_name"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// Approve or drop a pending request; false when there was none
    pub async fn respond(
        &self,
        following_id: Uuid,
        follower_id: Uuid,
        approve: bool,
    ) -> ApiResult<bool> {
        let query = if approve {
            "UPDATE follows SET status = 'approved' \
             WHERE following_id = $1 AND follower_id = $2 AND status = 'pending'"
        } else {
            "DELETE FROM follows \
             WHERE following_id = $1 AND follower_id = $2 AND status = 'pending'"
        };

        let result = sqlx::query(query)
            .bind(following_id)
            .bind(follower_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creators_approve_their_followers() {
        assert_eq!(FollowStatus::initial_for(Role::Creator), FollowStatus::Pending);
        assert_eq!(FollowStatus::initial_for(Role::User), FollowStatus::Approved);
        assert_eq!(FollowStatus::initial_for(Role::Admin), FollowStatus::Approved);
    }
}
