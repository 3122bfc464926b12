//! PostgreSQL membership store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    error::ApiResult,
    membership::{Activation, MembershipStore, PendingMembership},
    models::{Membership, MembershipState},
};

const MEMBERSHIP_COLUMNS: &str = "id, user_id, start_date, end_date, status, provider, \
     provider_subscription_id, amount_cents, currency, created_at, updated_at";

#[derive(Clone)]
pub struct PgMembershipStore {
    pool: PgPool,
}

impl PgMembershipStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for PgMembershipStore {
    async fn insert_pending(&self, pending: PendingMembership) -> ApiResult<Membership> {
        let row = sqlx::query(&format!(
            "INSERT INTO memberships \
             (user_id, start_date, end_date, status, provider, provider_subscription_id, amount_cents) \
             VALUES ($1, $2, $3, 'pending', $4, $5, $6) RETURNING {}",
            MEMBERSHIP_COLUMNS
        ))
        .bind(pending.user_id)
        .bind(pending.start_date)
        .bind(pending.end_date)
        .bind(&pending.provider)
        .bind(&pending.provider_subscription_id)
        .bind(pending.amount_cents)
        .fetch_one(&self.pool)
        .await?;

        Ok(membership_from_row(&row))
    }

    async fn activate(
        &self,
        provider_subscription_id: &str,
        activation: Activation,
    ) -> ApiResult<Option<Membership>> {
        let row = sqlx::query(&format!(
            "UPDATE memberships SET status = 'active', start_date = $2, end_date = $3, \
             provider = COALESCE($4, provider), amount_cents = COALESCE($5, amount_cents), \
             updated_at = NOW() \
             WHERE provider_subscription_id = $1 RETURNING {}",
            MEMBERSHIP_COLUMNS
        ))
        .bind(provider_subscription_id)
        .bind(activation.start_date)
        .bind(activation.end_date)
        .bind(&activation.provider)
        .bind(activation.amount_cents)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(membership_from_row))
    }

    async fn expire(
        &self,
        provider_subscription_id: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Membership>> {
        let row = sqlx::query(&format!(
            "UPDATE memberships SET status = 'expired', end_date = LEAST(end_date, $2), \
             updated_at = NOW() \
             WHERE provider_subscription_id = $1 RETURNING {}",
            MEMBERSHIP_COLUMNS
        ))
        .bind(provider_subscription_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(membership_from_row))
    }

    async fn latest_for_user(&self, user_id: Uuid) -> ApiResult<Option<Membership>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE user_id = $1 \
             ORDER BY end_date DESC, created_at DESC LIMIT 1",
            MEMBERSHIP_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(membership_from_row))
    }

    async fn find_by_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> ApiResult<Option<Membership>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM memberships WHERE provider_subscription_id = $1",
            MEMBERSHIP_COLUMNS
        ))
        .bind(provider_subscription_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(membership_from_row))
    }
}

fn membership_from_row(row: &PgRow) -> Membership {
    Membership {
        id: row.get("id"),
        user_id: row.get("user_id"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        status: MembershipState::from_db(row.get("status")),
        provider: row.get("provider"),
        provider_subscription_id: row.get("provider_subscription_id"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
