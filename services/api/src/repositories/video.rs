//! Video repository for database operations

use async_trait::async_trait;
use auth::Role;
use media::VideoStatusSink;
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{AccessMode, ListQuery, NewVideo, UpdateVideo, Video, VideoStatus},
    policy::ListingScope,
};

const VIDEO_COLUMNS: &str = "v.id, v.uploader_id, u.username AS uploader_name, \
     u.role AS uploader_role, v.title, v.description, v.video_url, v.thumbnail_url, \
     v.duration_seconds, v.status, v.rejection_reason, v.access_mode, v.single_username, \
     v.is_private, v.is_community, v.views_count, v.likes_count, v.dislikes_count, \
     v.category_id, c.name AS category_name, \
     ARRAY(SELECT t.name::text FROM video_tags vt JOIN tags t ON t.id = vt.tag_id \
           WHERE vt.video_id = v.id ORDER BY t.name) AS tags, \
     v.published_at, v.created_at, v.updated_at";

const VIDEO_FROM: &str = " FROM videos v \
     JOIN users u ON u.id = v.uploader_id \
     LEFT JOIN categories c ON c.id = v.category_id";

/// Which collection a listing draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// Main browse page (non-community videos)
    Browse,
    Community,
    Favorites(Uuid),
    History(Uuid),
    /// Public profile of one uploader
    Uploader(Uuid),
}

/// One page of a listing
#[derive(Debug, Clone, Serialize)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub page: u32,
    pub limit: u32,
    pub total: i64,
}

/// Stored files of a deleted video
#[derive(Debug, Clone)]
pub struct DeletedVideo {
    pub video_url: String,
    pub thumbnail_url: Option<String>,
}

/// Video repository
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<Video>> {
        let row = sqlx::query(&format!(
            "SELECT {}{} WHERE v.id = $1",
            VIDEO_COLUMNS, VIDEO_FROM
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(video_from_row))
    }

    /// Paginated listing filtered by `scope`.
    ///
    /// Falls back to a predicate without manual grants when the
    /// `video_access` table is missing.
    pub async fn list(
        &self,
        scope: &ListingScope,
        feed: Feed,
        query: &ListQuery,
    ) -> ApiResult<VideoPage> {
        match self.fetch_page(scope, feed, query, true).await {
            Err(ApiError::Database(e)) if e.is_undefined_table() => {
                warn!("Listing without manual access grants: {}", e);
                self.fetch_page(scope, feed, query, false).await
            }
            other => other,
        }
    }

    async fn fetch_page(
        &self,
        scope: &ListingScope,
        feed: Feed,
        query: &ListQuery,
        with_grants: bool,
    ) -> ApiResult<VideoPage> {
        let mut count = listing_query("SELECT COUNT(*)", scope, feed, query, with_grants);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = listing_query(
            &format!("SELECT {}", VIDEO_COLUMNS),
            scope,
            feed,
            query,
            with_grants,
        );
        let order_by = match feed {
            Feed::Favorites(_) => "fav.created_at DESC",
            Feed::History(_) => "wh.watched_at DESC",
            _ => query.sort.order_by(),
        };
        let pagination = query.pagination();
        select
            .push(" ORDER BY ")
            .push(order_by)
            .push(" LIMIT ")
            .push_bind(i64::from(pagination.limit()))
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = select.build().fetch_all(&self.pool).await?;

        Ok(VideoPage {
            videos: rows.iter().map(video_from_row).collect(),
            page: pagination.page(),
            limit: pagination.limit(),
            total,
        })
    }

    /// Every video of one uploader regardless of status, newest first
    pub async fn list_by_uploader(&self, uploader_id: Uuid) -> ApiResult<Vec<Video>> {
        let rows = sqlx::query(&format!(
            "SELECT {}{} WHERE v.uploader_id = $1 ORDER BY v.created_at DESC",
            VIDEO_COLUMNS, VIDEO_FROM
        ))
        .bind(uploader_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    /// Videos waiting for a moderator, oldest first
    pub async fn moderation_queue(&self) -> ApiResult<Vec<Video>> {
        let rows = sqlx::query(&format!(
            "SELECT {}{} WHERE v.status = 'pending_approval' ORDER BY v.created_at ASC",
            VIDEO_COLUMNS, VIDEO_FROM
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(video_from_row).collect())
    }

    /// Insert a freshly uploaded video in `processing`
    pub async fn insert(&self, new_video: &NewVideo) -> ApiResult<Video> {
        info!("Creating video: {}", new_video.title);

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO videos (uploader_id, title, description, video_url, category_id,
                                is_private, is_community, access_mode, single_username, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'processing')
            RETURNING id
            "#,
        )
        .bind(new_video.uploader_id)
        .bind(&new_video.title)
        .bind(&new_video.description)
        .bind(&new_video.video_url)
        .bind(new_video.category_id)
        .bind(new_video.is_private)
        .bind(new_video.is_community)
        .bind(new_video.access_mode.as_str())
        .bind(&new_video.single_username)
        .fetch_one(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::Internal(format!("Video {} vanished after insert", id)))
    }

    /// Move a video to `target`, see [`transition_on`]
    pub async fn transition(
        &self,
        id: Uuid,
        target: VideoStatus,
        rejection_reason: Option<&str>,
    ) -> ApiResult<()> {
        let mut conn = self.pool.acquire().await?;
        transition_on(&mut conn, id, target, rejection_reason).await
    }

    pub async fn update_metadata(&self, id: Uuid, update: &UpdateVideo) -> ApiResult<Option<Video>> {
        let updated = sqlx::query(
            r#"
            UPDATE videos
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                category_id = COALESCE($4, category_id),
                is_private = COALESCE($5, is_private),
                is_community = COALESCE($6, is_community),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.description)
        .bind(update.category_id)
        .bind(update.is_private)
        .bind(update.is_community)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn set_access_mode(
        &self,
        id: Uuid,
        mode: AccessMode,
        single_username: Option<&str>,
    ) -> ApiResult<bool> {
        let result = sqlx::query(
            "UPDATE videos SET access_mode = $2, single_username = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(mode.as_str())
        .bind(single_username)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete the row; dependents cascade
    pub async fn delete(&self, id: Uuid) -> ApiResult<Option<DeletedVideo>> {
        info!("Deleting video {}", id);

        let row = sqlx::query("DELETE FROM videos WHERE id = $1 RETURNING video_url, thumbnail_url")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| DeletedVideo {
            video_url: row.get("video_url"),
            thumbnail_url: row.get("thumbnail_url"),
        }))
    }

    pub async fn increment_views(&self, id: Uuid) -> ApiResult<()> {
        sqlx::query("UPDATE videos SET views_count = views_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl VideoStatusSink for VideoRepository {
    async fn mark_processed(
        &self,
        video_id: Uuid,
        thumbnail_url: &str,
        duration_seconds: i32,
    ) -> anyhow::Result<()> {
        let result = sqlx::query(
            "UPDATE videos SET thumbnail_url = $2, duration_seconds = $3, \
             status = 'pending_approval', updated_at = NOW() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(video_id)
        .bind(thumbnail_url)
        .bind(duration_seconds)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!("Video {} left processing before its job finished", video_id);
        }
        Ok(())
    }

    async fn mark_failed(&self, video_id: Uuid, reason: &str) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE videos SET status = 'rejected', rejection_reason = $2, updated_at = NOW() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(video_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Move a video to `target` if its current status allows it.
///
/// Approval stamps `published_at` once. `rejection_reason` is replaced on
/// every transition. Missing video is NotFound, a disallowed move Conflict.
pub async fn transition_on(
    conn: &mut PgConnection,
    id: Uuid,
    target: VideoStatus,
    rejection_reason: Option<&str>,
) -> ApiResult<()> {
    let moved = sqlx::query(
        r#"
        UPDATE videos
        SET status = $2,
            rejection_reason = $3,
            published_at = CASE WHEN $2 = 'approved' THEN COALESCE(published_at, NOW())
                                ELSE published_at END,
            updated_at = NOW()
        WHERE id = $1 AND status = ANY($4)
        "#,
    )
    .bind(id)
    .bind(target.as_str())
    .bind(rejection_reason)
    .bind(target.allowed_source_names())
    .execute(&mut *conn)
    .await?;

    if moved.rows_affected() > 0 {
        info!("Video {} is now {}", id, target);
        return Ok(());
    }

    let current: Option<String> = sqlx::query_scalar("SELECT status FROM videos WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match current {
        None => Err(ApiError::video_not_found()),
        Some(current) => Err(ApiError::Conflict(format!(
            "Cannot move video from {} to {}",
            current, target
        ))),
    }
}

fn listing_query<'args>(
    head: &str,
    scope: &ListingScope,
    feed: Feed,
    query: &ListQuery,
    with_grants: bool,
) -> QueryBuilder<'args, Postgres> {
    let mut qb = QueryBuilder::new(head);
    qb.push(VIDEO_FROM);

    match feed {
        Feed::Favorites(user_id) => {
            qb.push(" JOIN favorites fav ON fav.video_id = v.id AND fav.user_id = ")
                .push_bind(user_id);
        }
        Feed::History(user_id) => {
            qb.push(" JOIN watch_history wh ON wh.video_id = v.id AND wh.user_id = ")
                .push_bind(user_id);
        }
        _ => {}
    }

    qb.push(" WHERE ");
    scope.push_predicate(&mut qb, with_grants);

    match feed {
        Feed::Browse => {
            qb.push(" AND NOT v.is_community");
        }
        Feed::Community => {
            qb.push(" AND v.is_community");
        }
        Feed::Uploader(uploader_id) => {
            qb.push(" AND v.uploader_id = ").push_bind(uploader_id);
        }
        Feed::Favorites(_) | Feed::History(_) => {}
    }

    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        qb.push(" AND (c.slug = ")
            .push_bind(category.to_string())
            .push(" OR lower(c.name) = lower(")
            .push_bind(category.to_string())
            .push("))");
    }

    if let Some(tag) = query.tag.as_deref().filter(|t| !t.is_empty()) {
        qb.push(
            " AND EXISTS (SELECT 1 FROM video_tags vt JOIN tags t ON t.id = vt.tag_id \
             WHERE vt.video_id = v.id AND lower(t.name) = lower(",
        )
        .push_bind(tag.to_string())
        .push("))");
    }

    qb
}

fn video_from_row(row: &PgRow) -> Video {
    // CHECK constraints keep these parseable; fall back to the most restrictive value
    let status = row
        .get::<String, _>("status")
        .parse()
        .unwrap_or(VideoStatus::Removed);
    let access_mode = row
        .get::<String, _>("access_mode")
        .parse()
        .unwrap_or(AccessMode::UsernameOnly);

    Video {
        id: row.get("id"),
        uploader_id: row.get("uploader_id"),
        uploader_name: row.get("uploader_name"),
        uploader_role: Role::from_db(row.get("uploader_role")),
        title: row.get("title"),
        description: row.get("description"),
        video_url: row.get("video_url"),
        thumbnail_url: row.get("thumbnail_url"),
        duration_seconds: row.get("duration_seconds"),
        status,
        rejection_reason: row.get("rejection_reason"),
        access_mode,
        single_username: row.get("single_username"),
        is_private: row.get("is_private"),
        is_community: row.get("is_community"),
        views_count: row.get("views_count"),
        likes_count: row.get("likes_count"),
        dislikes_count: row.get("dislikes_count"),
        category_id: row.get("category_id"),
        category_name: row.get("category_name"),
        tags: row.get("tags"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ListingViewer;

    fn viewer_scope() -> ListingScope {
        ListingScope::Viewer {
            viewer: Some(ListingViewer {
                id: Uuid::new_v4(),
                username: "alice".to_string(),
            }),
            entitled: false,
        }
    }

    #[test]
    fn test_browse_excludes_community() {
        let qb = listing_query(
            "SELECT COUNT(*)",
            &ListingScope::Staff,
            Feed::Browse,
            &ListQuery::default(),
            true,
        );
        assert!(qb.sql().starts_with("SELECT COUNT(*) FROM videos v"));
        assert!(qb.sql().ends_with("v.status = 'approved' AND NOT v.is_community"));
    }

    #[test]
    fn test_favorites_join_the_viewer_rows() {
        let qb = listing_query(
            "SELECT COUNT(*)",
            &viewer_scope(),
            Feed::Favorites(Uuid::new_v4()),
            &ListQuery::default(),
            true,
        );
        assert!(qb.sql().contains("JOIN favorites fav ON fav.video_id = v.id AND fav.user_id = $1"));
        assert!(qb.sql().contains("video_access"));
    }

    #[test]
    fn test_degraded_listing_drops_only_the_grant_clause() {
        let full = listing_query("SELECT 1", &viewer_scope(), Feed::Community, &ListQuery::default(), true);
        let degraded =
            listing_query("SELECT 1", &viewer_scope(), Feed::Community, &ListQuery::default(), false);

        assert!(!degraded.sql().contains("video_access"));
        assert!(degraded.sql().contains("lower(v.single_username)"));
        assert!(degraded.sql().ends_with("AND v.is_community"));
        assert!(full.sql().len() > degraded.sql().len());
    }

    #[test]
    fn test_category_and_tag_filters_are_bound() {
        let query = ListQuery {
            category: Some("music".to_string()),
            tag: Some("cats".to_string()),
            ..Default::default()
        };
        let qb = listing_query("SELECT 1", &ListingScope::Staff, Feed::Browse, &query, true);

        assert!(qb.sql().contains("c.slug = $1 OR lower(c.name) = lower($2)"));
        assert!(qb.sql().contains("lower(t.name) = lower($3)"));
        assert!(!qb.sql().contains("music"));
    }
}
