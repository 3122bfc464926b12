//! Login throttling keyed by account email

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lockout duration in seconds
    pub lockout_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,
            lockout_seconds: 3600,
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    window_start: Instant,
    locked_until: Option<Instant>,
}

impl RateLimiterEntry {
    /// Still counting attempts or still locked
    fn is_live(&self, now: Instant, window: Duration) -> bool {
        match self.locked_until {
            Some(locked_until) => now < locked_until,
            None => now.duration_since(self.window_start) < window,
        }
    }
}

/// In-process limiter for login attempts
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt for `key` and report whether it may proceed
    pub async fn is_allowed(&self, key: &str) -> bool {
        let key = normalize(key);
        let mut entries = self.entries.lock().await;
        let now = Instant::now();

        let window = Duration::from_secs(self.config.window_seconds);
        entries.retain(|_, e| e.is_live(now, window));

        let entry = entries.entry(key.clone()).or_insert(RateLimiterEntry {
            attempts: 0,
            window_start: now,
            locked_until: None,
        });

        if let Some(locked_until) = entry.locked_until {
            if now < locked_until {
                return false;
            }
            entry.attempts = 0;
            entry.locked_until = None;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= Duration::from_secs(self.config.window_seconds) {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.locked_until = Some(now + Duration::from_secs(self.config.lockout_seconds));
            info!(
                "Locked login for {} for {} seconds",
                key, self.config.lockout_seconds
            );
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget attempts for `key` after a successful login
    pub async fn reset(&self, key: &str) {
        self.entries.lock().await.remove(&normalize(key));
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
