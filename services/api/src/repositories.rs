//! Repositories for database operations

pub mod access;
pub mod audit;
pub mod engagement;
pub mod follow;
pub mod membership;
pub mod moderation;
pub mod removal;
pub mod settings;
pub mod video;

pub use access::AccessRepository;
pub use audit::{AuditEntry, AuditRepository};
pub use engagement::EngagementRepository;
pub use follow::{FollowRepository, FollowStatus};
pub use membership::PgMembershipStore;
pub use moderation::{FlagOutcome, ModerationRepository, PlatformStats};
pub use removal::RemovalRepository;
pub use settings::SettingsRepository;
pub use video::{Feed, VideoPage, VideoRepository};
