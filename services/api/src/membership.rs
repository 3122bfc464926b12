//! Paid membership lifecycle
//!
//! A checkout creates a `pending` row. The payment provider's renewal webhook
//! activates it for the configured duration and the expiration webhook ends
//! it. Only the latest row per user (by end date, then creation time) counts.

use async_trait::async_trait;
use auth::{Capability, User};
use chrono::{DateTime, Duration, Utc};
use common::config::AppConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{Membership, MembershipStatus},
};

/// Membership pricing and checkout settings
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    pub duration_days: i64,
    pub price_cents: i32,
    pub provider: String,
    pub checkout_url: String,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            duration_days: 30,
            price_cents: 500,
            provider: "paypal".to_string(),
            checkout_url: "https://payments.mock/membership".to_string(),
        }
    }
}

impl From<&AppConfig> for MembershipConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            duration_days: config.membership_duration_days,
            price_cents: config.membership_price_cents,
            provider: config.membership_provider.clone(),
            checkout_url: config.membership_checkout_url.clone(),
        }
    }
}

/// Values for a new pending membership row
#[derive(Debug, Clone)]
pub struct PendingMembership {
    pub user_id: Uuid,
    pub provider: String,
    pub provider_subscription_id: String,
    pub amount_cents: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Values applied when a renewal is confirmed
#[derive(Debug, Clone)]
pub struct Activation {
    pub provider: Option<String>,
    pub amount_cents: Option<i32>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

/// Persistence seam for memberships
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn insert_pending(&self, pending: PendingMembership) -> ApiResult<Membership>;

    /// Mark active; `None` when the subscription id is unknown
    async fn activate(
        &self,
        provider_subscription_id: &str,
        activation: Activation,
    ) -> ApiResult<Option<Membership>>;

    /// Mark expired and clamp the end date to `now`; `None` when unknown
    async fn expire(
        &self,
        provider_subscription_id: &str,
        now: DateTime<Utc>,
    ) -> ApiResult<Option<Membership>>;

    async fn latest_for_user(&self, user_id: Uuid) -> ApiResult<Option<Membership>>;

    async fn find_by_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> ApiResult<Option<Membership>>;
}

/// Result of starting a checkout
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub checkout_url: String,
    pub provider_subscription_id: String,
    pub membership: Membership,
}

fn positive_amount(amount_cents: i32) -> ApiResult<i32> {
    if amount_cents <= 0 {
        return Err(ApiError::Validation(
            "amount_cents must be positive".to_string(),
        ));
    }
    Ok(amount_cents)
}

#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn MembershipStore>,
    config: MembershipConfig,
}

impl MembershipService {
    pub fn new(store: Arc<dyn MembershipStore>, config: MembershipConfig) -> Self {
        Self { store, config }
    }

    fn period(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now, now + Duration::days(self.config.duration_days))
    }

    /// Create a pending membership and the URL the client pays at
    pub async fn start_checkout(
        &self,
        user_id: Uuid,
        provider: Option<String>,
        amount_cents: Option<i32>,
    ) -> ApiResult<Checkout> {
        let amount_cents = positive_amount(amount_cents.unwrap_or(self.config.price_cents))?;

        let provider = provider
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.config.provider.clone());
        let provider_subscription_id = format!("sub_{}", Uuid::new_v4());
        let (start_date, end_date) = self.period(Utc::now());

        let membership = self
            .store
            .insert_pending(PendingMembership {
                user_id,
                provider,
                provider_subscription_id: provider_subscription_id.clone(),
                amount_cents,
                start_date,
                end_date,
            })
            .await?;

        info!(
            "Started checkout {} for user {}",
            provider_subscription_id, user_id
        );

        Ok(Checkout {
            checkout_url: format!(
                "{}?subscription={}&amount={}",
                self.config.checkout_url, provider_subscription_id, amount_cents
            ),
            provider_subscription_id,
            membership,
        })
    }

    /// Activate a subscription for a fresh period. Repeating the call simply
    /// starts the period again.
    pub async fn confirm_renewal(
        &self,
        provider_subscription_id: &str,
        provider: Option<String>,
        amount_cents: Option<i32>,
    ) -> ApiResult<Membership> {
        let amount_cents = amount_cents.map(positive_amount).transpose()?;
        let (start_date, end_date) = self.period(Utc::now());

        let membership = self
            .store
            .activate(
                provider_subscription_id,
                Activation {
                    provider,
                    amount_cents,
                    start_date,
                    end_date,
                },
            )
            .await?
            .ok_or_else(subscription_not_found)?;

        info!("Membership {} renewed until {}", provider_subscription_id, end_date);
        Ok(membership)
    }

    /// Renewal on behalf of the checkout's owner; other users' ids look unknown
    pub async fn confirm_renewal_for(
        &self,
        user_id: Uuid,
        provider_subscription_id: &str,
    ) -> ApiResult<Membership> {
        let owned = self
            .store
            .find_by_subscription(provider_subscription_id)
            .await?
            .is_some_and(|m| m.user_id == user_id);
        if !owned {
            return Err(subscription_not_found());
        }

        self.confirm_renewal(provider_subscription_id, None, None)
            .await
    }

    pub async fn confirm_expiration(&self, provider_subscription_id: &str) -> ApiResult<Membership> {
        let membership = self
            .store
            .expire(provider_subscription_id, Utc::now())
            .await?
            .ok_or_else(subscription_not_found)?;

        info!("Membership {} expired", provider_subscription_id);
        Ok(membership)
    }

    /// Whether `user` may watch paid-fans content right now
    pub async fn is_entitled(&self, user: &User) -> ApiResult<bool> {
        if user.role.has_capability(Capability::ImplicitEntitlement) {
            return Ok(true);
        }

        let latest = self.store.latest_for_user(user.id).await?;
        Ok(latest.is_some_and(|m| m.is_active_at(Utc::now())))
    }

    pub async fn status(&self, user_id: Uuid) -> ApiResult<MembershipStatus> {
        let membership = self.store.latest_for_user(user_id).await?;
        let is_active = membership
            .as_ref()
            .is_some_and(|m| m.is_active_at(Utc::now()));

        Ok(MembershipStatus {
            membership,
            is_active,
        })
    }
}

fn subscription_not_found() -> ApiError {
    ApiError::NotFound("Subscription not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MembershipState;
    use auth::Role;
    use tokio::sync::Mutex;

    /// In-memory store keyed by subscription id
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<Membership>>,
    }

    impl MemoryStore {
        async fn push(&self, membership: Membership) {
            self.rows.lock().await.push(membership);
        }

        async fn len(&self) -> usize {
            self.rows.lock().await.len()
        }
    }

    #[async_trait]
    impl MembershipStore for MemoryStore {
        async fn insert_pending(&self, pending: PendingMembership) -> ApiResult<Membership> {
            let now = Utc::now();
            let membership = Membership {
                id: Uuid::new_v4(),
                user_id: pending.user_id,
                start_date: pending.start_date,
                end_date: pending.end_date,
                status: MembershipState::Pending,
                provider: pending.provider,
                provider_subscription_id: pending.provider_subscription_id,
                amount_cents: pending.amount_cents,
                currency: "USD".to_string(),
                created_at: now,
                updated_at: now,
            };
            self.rows.lock().await.push(membership.clone());
            Ok(membership)
        }

        async fn activate(
            &self,
            provider_subscription_id: &str,
            activation: Activation,
        ) -> ApiResult<Option<Membership>> {
            let mut rows = self.rows.lock().await;
            let Some(row) = rows
                .iter_mut()
                .find(|m| m.provider_subscription_id == provider_subscription_id)
            else {
                return Ok(None);
            };

            row.status = MembershipState::Active;
            row.start_date = activation.start_date;
            row.end_date = activation.end_date;
            if let Some(provider) = activation.provider {
                row.provider = provider;
            }
            if let Some(amount) = activation.amount_cents {
                row.amount_cents = amount;
            }
            Ok(Some(row.clone()))
        }

        async fn expire(
            &self,
            provider_subscription_id: &str,
            now: DateTime<Utc>,
        ) -> ApiResult<Option<Membership>> {
            let mut rows = self.rows.lock().await;
            let Some(row) = rows
                .iter_mut()
                .find(|m| m.provider_subscription_id == provider_subscription_id)
            else {
                return Ok(None);
            };

            row.status = MembershipState::Expired;
            row.end_date = row.end_date.min(now);
            Ok(Some(row.clone()))
        }

        async fn latest_for_user(&self, user_id: Uuid) -> ApiResult<Option<Membership>> {
            let rows = self.rows.lock().await;
            Ok(rows
                .iter()
                .filter(|m| m.user_id == user_id)
                .max_by_key(|m| (m.end_date, m.created_at))
                .cloned())
        }

        async fn find_by_subscription(
            &self,
            provider_subscription_id: &str,
        ) -> ApiResult<Option<Membership>> {
            let rows = self.rows.lock().await;
            Ok(rows
                .iter()
                .find(|m| m.provider_subscription_id == provider_subscription_id)
                .cloned())
        }
    }

    fn service() -> (MembershipService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (
            MembershipService::new(store.clone(), MembershipConfig::default()),
            store,
        )
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "member".to_string(),
            email: "member@example.com".to_string(),
            password_hash: String::new(),
            role,
            banned_until: None,
            ban_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn row(user_id: Uuid, status: MembershipState, end_date: DateTime<Utc>) -> Membership {
        Membership {
            id: Uuid::new_v4(),
            user_id,
            start_date: end_date - Duration::days(30),
            end_date,
            status,
            provider: "paypal".to_string(),
            provider_subscription_id: format!("sub_{}", Uuid::new_v4()),
            amount_cents: 500,
            currency: "USD".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_checkout_is_pending_and_grants_nothing() {
        let (service, _) = service();
        let member = user(Role::User);

        let checkout = service.start_checkout(member.id, None, None).await.unwrap();

        assert!(checkout.provider_subscription_id.starts_with("sub_"));
        assert_eq!(
            checkout.checkout_url,
            format!(
                "https://payments.mock/membership?subscription={}&amount=500",
                checkout.provider_subscription_id
            )
        );
        assert_eq!(checkout.membership.status, MembershipState::Pending);
        assert_eq!(checkout.membership.provider, "paypal");
        assert_eq!(
            checkout.membership.end_date - checkout.membership.start_date,
            Duration::days(30)
        );
        assert!(!service.is_entitled(&member).await.unwrap());
    }

    #[tokio::test]
    async fn test_checkout_rejects_non_positive_amount() {
        let (service, store) = service();
        let result = service.start_checkout(Uuid::new_v4(), None, Some(0)).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_renewal_activates_and_overrides() {
        let (service, _) = service();
        let member = user(Role::User);
        let checkout = service.start_checkout(member.id, None, None).await.unwrap();

        let renewed = service
            .confirm_renewal(
                &checkout.provider_subscription_id,
                Some("stripe".to_string()),
                Some(900),
            )
            .await
            .unwrap();

        assert_eq!(renewed.status, MembershipState::Active);
        assert_eq!(renewed.provider, "stripe");
        assert_eq!(renewed.amount_cents, 900);
        assert!(service.is_entitled(&member).await.unwrap());

        // confirming again keeps it active
        let again = service
            .confirm_renewal(&checkout.provider_subscription_id, None, None)
            .await
            .unwrap();
        assert_eq!(again.status, MembershipState::Active);
        assert_eq!(again.provider, "stripe");
    }

    #[tokio::test]
    async fn test_renewal_rejects_non_positive_amount() {
        let (service, _) = service();
        let member = user(Role::User);
        let checkout = service.start_checkout(member.id, None, Some(700)).await.unwrap();

        for amount in [0, -250] {
            let result = service
                .confirm_renewal(&checkout.provider_subscription_id, None, Some(amount))
                .await;
            assert!(matches!(result, Err(ApiError::Validation(_))));
        }

        // nothing was activated by the rejected calls
        assert!(!service.is_entitled(&member).await.unwrap());
        let status = service.status(member.id).await.unwrap();
        let membership = status.membership.unwrap();
        assert_eq!(membership.status, MembershipState::Pending);
        assert_eq!(membership.amount_cents, 700);
    }

    #[tokio::test]
    async fn test_renewal_of_unknown_subscription_creates_nothing() {
        let (service, store) = service();

        let result = service.confirm_renewal("sub_missing", None, None).await;

        assert!(matches!(result, Err(ApiError::NotFound(_))));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_owner_only_completion() {
        let (service, _) = service();
        let owner = user(Role::User);
        let checkout = service.start_checkout(owner.id, None, None).await.unwrap();

        let stranger = service
            .confirm_renewal_for(Uuid::new_v4(), &checkout.provider_subscription_id)
            .await;
        assert!(matches!(stranger, Err(ApiError::NotFound(_))));
        assert!(!service.is_entitled(&owner).await.unwrap());

        service
            .confirm_renewal_for(owner.id, &checkout.provider_subscription_id)
            .await
            .unwrap();
        assert!(service.is_entitled(&owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_expiration_ends_entitlement() {
        let (service, _) = service();
        let member = user(Role::User);
        let checkout = service.start_checkout(member.id, None, None).await.unwrap();
        service
            .confirm_renewal(&checkout.provider_subscription_id, None, None)
            .await
            .unwrap();

        let expired = service
            .confirm_expiration(&checkout.provider_subscription_id)
            .await
            .unwrap();

        assert_eq!(expired.status, MembershipState::Expired);
        assert!(expired.end_date <= Utc::now());
        assert!(!service.is_entitled(&member).await.unwrap());
        assert!(matches!(
            service.confirm_expiration("sub_missing").await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_active_row_past_end_date_is_not_entitled() {
        let (service, store) = service();
        let member = user(Role::User);
        store
            .push(row(
                member.id,
                MembershipState::Active,
                Utc::now() - Duration::seconds(1),
            ))
            .await;

        assert!(!service.is_entitled(&member).await.unwrap());
        assert!(!service.status(member.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_only_latest_row_counts() {
        let (service, store) = service();
        let member = user(Role::User);
        store
            .push(row(
                member.id,
                MembershipState::Active,
                Utc::now() + Duration::days(5),
            ))
            .await;
        store
            .push(row(
                member.id,
                MembershipState::Pending,
                Utc::now() + Duration::days(30),
            ))
            .await;

        assert!(!service.is_entitled(&member).await.unwrap());
    }

    #[tokio::test]
    async fn test_staff_and_creators_are_implicitly_entitled() {
        let (service, _) = service();
        for role in [Role::Creator, Role::Moderator, Role::Admin] {
            assert!(service.is_entitled(&user(role)).await.unwrap());
        }
        assert!(!service.is_entitled(&user(Role::User)).await.unwrap());
    }
}
