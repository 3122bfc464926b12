//! API models for request and response payloads

pub mod engagement;
pub mod membership;
pub mod moderation;
pub mod pagination;
pub mod video;

pub use engagement::{Comment, NewComment, RatingCounts};
pub use membership::{Membership, MembershipState, MembershipStatus};
pub use moderation::{AuditLog, Flag, RemovalRequest, RemovalStatus};
pub use pagination::Pagination;
pub use video::{AccessMode, ListQuery, NewVideo, SortOrder, UpdateVideo, Video, VideoStatus};
