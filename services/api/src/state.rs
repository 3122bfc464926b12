//! Application state shared across handlers

use auth::AuthService;
use common::config::AppConfig;
use media::{MediaProcessor, ProcessingQueue, StorageBackend};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    membership::{MembershipConfig, MembershipService},
    policy::StorePolicyFacts,
    repositories::{
        AccessRepository, AuditRepository, EngagementRepository, FollowRepository,
        ModerationRepository, PgMembershipStore, RemovalRepository, SettingsRepository,
        VideoRepository,
    },
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub videos: VideoRepository,
    pub access: AccessRepository,
    pub follows: FollowRepository,
    pub engagement: EngagementRepository,
    pub moderation: ModerationRepository,
    pub removals: RemovalRepository,
    pub settings: SettingsRepository,
    pub audit: AuditRepository,
    pub membership: MembershipService,
    pub storage: Arc<dyn StorageBackend>,
    pub queue: ProcessingQueue,
}

impl AppState {
    /// Wire repositories and services around one pool. The processing queue
    /// reports its outcomes to the video repository.
    pub fn new(
        db_pool: PgPool,
        config: AppConfig,
        auth: AuthService,
        storage: Arc<dyn StorageBackend>,
        processor: Arc<dyn MediaProcessor>,
    ) -> Self {
        let videos = VideoRepository::new(db_pool.clone());
        let queue = ProcessingQueue::new(processor, Arc::new(videos.clone()));
        let membership = MembershipService::new(
            Arc::new(PgMembershipStore::new(db_pool.clone())),
            MembershipConfig::from(&config),
        );

        Self {
            access: AccessRepository::new(db_pool.clone()),
            follows: FollowRepository::new(db_pool.clone()),
            engagement: EngagementRepository::new(db_pool.clone()),
            moderation: ModerationRepository::new(db_pool.clone()),
            removals: RemovalRepository::new(db_pool.clone()),
            settings: SettingsRepository::new(db_pool.clone()),
            audit: AuditRepository::new(db_pool.clone()),
            config: Arc::new(config),
            db_pool,
            auth,
            videos,
            membership,
            storage,
            queue,
        }
    }

    /// Facts for the access policy, loaded from the stores on demand
    pub fn policy_facts(&self) -> StorePolicyFacts {
        StorePolicyFacts::new(
            self.membership.clone(),
            self.access.clone(),
            self.follows.clone(),
        )
    }
}
