//! Read access to videos
//!
//! `decide` gates a single video fetch. `ListingScope` renders the same rules
//! as a SQL predicate for paginated listings so that a listing never shows a
//! video a direct fetch would refuse.
//!
//! Rule order, first match wins:
//! 1. staff (`BypassAccessPolicy`) may read anything
//! 2. a video that is not approved only exists for its uploader
//! 3. creator uploads require an account
//! 4. `paidfans` requires entitlement
//! 5. `username_only` requires the allow-name or a grant
//! 6. private videos require an approved follow of the uploader
//!
//! Rules 4 to 6 never apply to the uploader.

use async_trait::async_trait;
use auth::{Capability, Role, User};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    membership::MembershipService,
    models::{AccessMode, Video, VideoStatus},
    repositories::{AccessRepository, FollowRepository},
};

/// Why a read was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotFound,
    SignUpRequired,
    PaymentRequired,
    Restricted,
    Private,
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::NotFound => ApiError::video_not_found(),
            Denial::SignUpRequired => ApiError::SignUpRequired,
            Denial::PaymentRequired => ApiError::PaymentRequired,
            Denial::Restricted => {
                ApiError::Forbidden("This video is restricted to specific users".to_string())
            }
            Denial::Private => ApiError::Forbidden(
                "This video is private. You must follow the creator to view it.".to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn into_result(self) -> ApiResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(denial) => Err(denial.into()),
        }
    }
}

/// Facts the policy needs beyond the video row, loaded only when a rule
/// reaches them
#[async_trait]
pub trait PolicyFacts: Send + Sync {
    async fn is_entitled(&self, viewer: &User) -> ApiResult<bool>;
    async fn has_grant(&self, video_id: Uuid, username: &str) -> ApiResult<bool>;
    async fn follow_approved(&self, follower_id: Uuid, following_id: Uuid) -> ApiResult<bool>;
}

fn is_staff(viewer: Option<&User>) -> bool {
    viewer.is_some_and(|v| v.role.has_capability(Capability::BypassAccessPolicy))
}

fn same_username(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Decide whether `viewer` may read `video`
pub async fn decide(
    video: &Video,
    viewer: Option<&User>,
    facts: &dyn PolicyFacts,
) -> ApiResult<Decision> {
    use Decision::*;

    if is_staff(viewer) {
        return Ok(Allow);
    }

    let is_uploader = viewer.is_some_and(|v| v.id == video.uploader_id);

    if video.status != VideoStatus::Approved && !is_uploader {
        return Ok(Deny(Denial::NotFound));
    }

    if video.uploader_role == Role::Creator && viewer.is_none() {
        return Ok(Deny(Denial::SignUpRequired));
    }

    if is_uploader {
        return Ok(Allow);
    }

    match video.access_mode {
        AccessMode::Public => {}
        AccessMode::Paidfans => {
            let entitled = match viewer {
                Some(v) => facts.is_entitled(v).await?,
                None => false,
            };
            if !entitled {
                return Ok(Deny(Denial::PaymentRequired));
            }
        }
        AccessMode::UsernameOnly => {
            let Some(v) = viewer else {
                return Ok(Deny(Denial::Restricted));
            };
            let named = video
                .single_username
                .as_deref()
                .is_some_and(|name| same_username(name, &v.username));
            if !named && !facts.has_grant(video.id, &v.username).await? {
                return Ok(Deny(Denial::Restricted));
            }
        }
    }

    if video.is_private {
        let follows = match viewer {
            Some(v) => facts.follow_approved(v.id, video.uploader_id).await?,
            None => false,
        };
        if !follows {
            return Ok(Deny(Denial::Private));
        }
    }

    Ok(Allow)
}

/// Identity of a signed-in viewer as used by listing predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingViewer {
    pub id: Uuid,
    pub username: String,
}

/// Row filter applied to every paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScope {
    /// Staff see every approved video
    Staff,
    Viewer {
        viewer: Option<ListingViewer>,
        entitled: bool,
    },
}

impl ListingScope {
    pub async fn for_viewer(viewer: Option<&User>, facts: &dyn PolicyFacts) -> ApiResult<Self> {
        if is_staff(viewer) {
            return Ok(ListingScope::Staff);
        }

        let entitled = match viewer {
            Some(v) => facts.is_entitled(v).await?,
            None => false,
        };

        Ok(ListingScope::Viewer {
            viewer: viewer.map(|v| ListingViewer {
                id: v.id,
                username: v.username.clone(),
            }),
            entitled,
        })
    }

    /// Append the predicate over `videos v JOIN users u` to `qb`.
    ///
    /// With `with_grants` off, `username_only` videos match the allow-name
    /// only; the result is never broader than the full predicate.
    pub fn push_predicate<'args>(&self, qb: &mut QueryBuilder<'args, Postgres>, with_grants: bool) {
        qb.push("v.status = 'approved'");

        let (viewer, entitled) = match self {
            ListingScope::Staff => return,
            ListingScope::Viewer { viewer, entitled } => (viewer, *entitled),
        };

        qb.push(" AND (");
        if let Some(v) = viewer {
            qb.push("v.uploader_id = ").push_bind(v.id).push(" OR ");
        }

        qb.push("(");
        if viewer.is_none() {
            qb.push("u.role <> 'creator'");
        } else {
            qb.push("TRUE");
        }

        if !entitled {
            qb.push(" AND v.access_mode <> 'paidfans'");
        }

        match viewer {
            Some(v) => {
                qb.push(" AND (v.access_mode <> 'username_only' OR lower(v.single_username) = lower(")
                    .push_bind(v.username.clone())
                    .push(")");
                if with_grants {
                    qb.push(
                        " OR EXISTS (SELECT 1 FROM video_access va \
                         WHERE va.video_id = v.id AND lower(va.username) = lower(",
                    )
                    .push_bind(v.username.clone())
                    .push("))");
                }
                qb.push(")");

                qb.push(
                    " AND (NOT v.is_private OR EXISTS (SELECT 1 FROM follows f WHERE f.follower_id = ",
                )
                .push_bind(v.id)
                .push(" AND f.following_id = v.uploader_id AND f.status = 'approved'))");
            }
            None => {
                qb.push(" AND v.access_mode <> 'username_only' AND NOT v.is_private");
            }
        }

        qb.push("))");
    }

    /// In-memory twin of `push_predicate` (with grants)
    pub fn admits(&self, video: &Video, has_grant: bool, follow_approved: bool) -> bool {
        if video.status != VideoStatus::Approved {
            return false;
        }

        let (viewer, entitled) = match self {
            ListingScope::Staff => return true,
            ListingScope::Viewer { viewer, entitled } => (viewer.as_ref(), *entitled),
        };

        if viewer.is_some_and(|v| v.id == video.uploader_id) {
            return true;
        }

        if viewer.is_none() && video.uploader_role == Role::Creator {
            return false;
        }

        if !entitled && video.access_mode == AccessMode::Paidfans {
            return false;
        }

        if video.access_mode == AccessMode::UsernameOnly {
            let Some(v) = viewer else {
                return false;
            };
            let named = video
                .single_username
                .as_deref()
                .is_some_and(|name| same_username(name, &v.username));
            if !named && !has_grant {
                return false;
            }
        }

        !video.is_private || (viewer.is_some() && follow_approved)
    }
}

/// `PolicyFacts` backed by the membership service and the stores
#[derive(Clone)]
pub struct StorePolicyFacts {
    membership: MembershipService,
    access: AccessRepository,
    follows: FollowRepository,
}

impl StorePolicyFacts {
    pub fn new(
        membership: MembershipService,
        access: AccessRepository,
        follows: FollowRepository,
    ) -> Self {
        Self {
            membership,
            access,
            follows,
        }
    }
}

#[async_trait]
impl PolicyFacts for StorePolicyFacts {
    async fn is_entitled(&self, viewer: &User) -> ApiResult<bool> {
        self.membership.is_entitled(viewer).await
    }

    async fn has_grant(&self, video_id: Uuid, username: &str) -> ApiResult<bool> {
        self.access.exists(video_id, username).await
    }

    async fn follow_approved(&self, follower_id: Uuid, following_id: Uuid) -> ApiResult<bool> {
        self.follows.is_approved(follower_id, following_id).await
    }
}
