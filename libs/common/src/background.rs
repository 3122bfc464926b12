//! Best-effort side effects
//!
//! View counters and audit rows are written after the response has been
//! decided. They run on a detached task; a failure is logged and never
//! reaches the caller.

use std::{fmt::Display, future::Future};
use tokio::task::JoinHandle;
use tracing::warn;

/// Run `fut` on a detached task, logging (not propagating) its error
pub fn spawn_best_effort<F, E>(label: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!(task = label, "Best-effort task failed: {}", e);
        }
    })
}
