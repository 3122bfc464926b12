//! ClipVault HTTP API: catalogue, access policy, engagement, moderation and
//! memberships on top of the auth and media crates.

pub mod error;
pub mod membership;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod repositories;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

/// Schema migrations embedded at build time
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
