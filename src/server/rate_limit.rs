//! Fixed-window request limiter for the webhook endpoint
//!
//! State is process-local; multiple server instances each count separately.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Windows are pruned once the map holds more keys than this.
const PRUNE_THRESHOLD: usize = 10_000;

#[async_trait::async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `key`; true if it exceeds `limit` in the current window.
    async fn is_rate_limited(&self, key: &str, limit: u32, window: Duration) -> bool;
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Default)]
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> bool {
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now <= w.reset_at);
        }

        match windows.get_mut(key) {
            Some(w) if now <= w.reset_at => {
                w.count = w.count.saturating_add(1);
                w.count > limit
            }
            _ => {
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                false
            }
        }
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait::async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn is_rate_limited(&self, key: &str, limit: u32, window: Duration) -> bool {
        self.check_at(key, limit, window, Instant::now()).await
    }
}
