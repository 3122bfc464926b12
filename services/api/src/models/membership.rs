use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Membership row status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    Pending,
    Active,
    Expired,
    Canceled,
}

impl MembershipState {
    pub fn as_str(self) -> &'static str {
        match self {
            MembershipState::Pending => "pending",
            MembershipState::Active => "active",
            MembershipState::Expired => "expired",
            MembershipState::Canceled => "canceled",
        }
    }

    /// Parse a stored value; unknown values never grant access
    pub fn from_db(value: &str) -> Self {
        match value {
            "pending" => MembershipState::Pending,
            "active" => MembershipState::Active,
            "canceled" => MembershipState::Canceled,
            _ => MembershipState::Expired,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: MembershipState,
    pub provider: String,
    pub provider_subscription_id: String,
    pub amount_cents: i32,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    /// Active and not yet past its end date
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipState::Active && self.end_date > now
    }
}

/// Response for `GET /membership/status`
#[derive(Debug, Clone, Serialize)]
pub struct MembershipStatus {
    pub membership: Option<Membership>,
    pub is_active: bool,
}
