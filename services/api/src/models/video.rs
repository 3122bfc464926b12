//! Video models and lifecycle rules

use auth::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::{error::ApiError, models::Pagination};

/// Moderation lifecycle of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Processing,
    PendingApproval,
    Approved,
    Rejected,
    Removed,
}

impl VideoStatus {
    pub const ALL: [VideoStatus; 5] = [
        VideoStatus::Processing,
        VideoStatus::PendingApproval,
        VideoStatus::Approved,
        VideoStatus::Rejected,
        VideoStatus::Removed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::PendingApproval => "pending_approval",
            VideoStatus::Approved => "approved",
            VideoStatus::Rejected => "rejected",
            VideoStatus::Removed => "removed",
        }
    }

    /// States a video may move into `self` from
    pub fn allowed_sources(self) -> &'static [VideoStatus] {
        use VideoStatus::*;
        match self {
            Processing => &[],
            PendingApproval => &[Processing, Approved],
            Approved => &[PendingApproval, Rejected],
            Rejected => &[Processing, PendingApproval, Approved],
            Removed => &[PendingApproval, Approved, Rejected],
        }
    }

    pub fn can_transition_to(self, target: VideoStatus) -> bool {
        target.allowed_sources().contains(&self)
    }

    /// Database values of `allowed_sources`, ready to bind to `ANY($n)`
    pub fn allowed_source_names(self) -> Vec<String> {
        self.allowed_sources()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect()
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VideoStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ApiError::Validation(format!("Unknown video status: {}", s)))
    }
}

/// Per-video visibility selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Public,
    Paidfans,
    UsernameOnly,
}

impl AccessMode {
    pub const ALL: [AccessMode; 3] = [
        AccessMode::Public,
        AccessMode::Paidfans,
        AccessMode::UsernameOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessMode::Public => "public",
            AccessMode::Paidfans => "paidfans",
            AccessMode::UsernameOnly => "username_only",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMode {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| {
                ApiError::Validation(
                    "access_mode must be one of public, paidfans, username_only".to_string(),
                )
            })
    }
}

/// Video as returned by the API, joined with its uploader
#[derive(Debug, Clone, Serialize)]
pub struct Video {
    pub id: Uuid,
    pub uploader_id: Uuid,
    pub uploader_name: String,
    pub uploader_role: Role,
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: i32,
    pub status: VideoStatus,
    pub rejection_reason: Option<String>,
    pub access_mode: AccessMode,
    pub single_username: Option<String>,
    pub is_private: bool,
    pub is_community: bool,
    pub views_count: i64,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written right after an upload is accepted
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub uploader_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub video_url: String,
    pub category_id: Option<Uuid>,
    pub is_private: bool,
    pub is_community: bool,
    pub access_mode: AccessMode,
    pub single_username: Option<String>,
}

/// Partial metadata update; absent fields are kept
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_private: Option<bool>,
    pub is_community: Option<bool>,
}

/// Listing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Popular,
    Trending,
    TopRated,
}

impl SortOrder {
    pub fn order_by(self) -> &'static str {
        match self {
            SortOrder::Newest => "v.created_at DESC",
            SortOrder::Oldest => "v.created_at ASC",
            SortOrder::Popular | SortOrder::Trending => "v.views_count DESC, v.created_at DESC",
            SortOrder::TopRated => "v.likes_count DESC, v.created_at DESC",
        }
    }
}

/// Query parameters for video listings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Page number (1-based)
    pub page: Option<u32>,
    /// Number of items per page
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: SortOrder,
    /// Category slug or name
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl ListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_table() {
        use VideoStatus::*;

        assert!(Processing.can_transition_to(PendingApproval));
        assert!(Processing.can_transition_to(Rejected));
        assert!(!Processing.can_transition_to(Approved));

        assert!(PendingApproval.can_transition_to(Approved));
        assert!(Approved.can_transition_to(PendingApproval));
        assert!(Rejected.can_transition_to(Approved));
        assert!(!Rejected.can_transition_to(PendingApproval));

        for target in VideoStatus::ALL {
            assert!(!Removed.can_transition_to(target));
        }
        assert!(!Processing.can_transition_to(Removed));
    }

    #[test]
    fn test_access_mode_parsing() {
        assert_eq!("paidfans".parse::<AccessMode>().unwrap(), AccessMode::Paidfans);
        assert_eq!(
            "username_only".parse::<AccessMode>().unwrap(),
            AccessMode::UsernameOnly
        );
        assert!(matches!(
            "friends".parse::<AccessMode>(),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_listing_uses_shared_pagination() {
        let query = ListQuery {
            page: Some(3),
            limit: Some(500),
            ..Default::default()
        };
        let page = query.pagination();
        assert_eq!(page.limit(), 100);
        assert_eq!(page.offset(), 200);
    }

    #[test]
    fn test_status_round_trip_through_strings() {
        for status in VideoStatus::ALL {
            assert_eq!(status.as_str().parse::<VideoStatus>().unwrap(), status);
        }
    }
}
