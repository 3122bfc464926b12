//! Flags, audit entries and removal requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Flag {
    pub id: Uuid,
    pub video_id: Uuid,
    pub video_title: Option<String>,
    pub reporter_id: Uuid,
    pub reporter_name: Option<String>,
    pub reason: String,
    pub description: Option<String>,
    pub status: String,
    /// Pending flags on the same video
    pub flag_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_name: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl RemovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RemovalStatus::Pending => "pending",
            RemovalStatus::Approved => "approved",
            RemovalStatus::Rejected => "rejected",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "approved" => RemovalStatus::Approved,
            "rejected" => RemovalStatus::Rejected,
            _ => RemovalStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalRequest {
    pub id: Uuid,
    pub video_id: Uuid,
    pub video_title: Option<String>,
    pub requester_id: Option<Uuid>,
    pub reason: String,
    pub description: Option<String>,
    pub status: RemovalStatus,
    pub admin_notes: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
