//! Fixed-window request throttling for the completion service.
//!
//! One limiter is shared by every agent of the process. Each agent role gets
//! its own counter, which is decremented on every completion call and refilled
//! when its window elapses. Callers that exhaust their budget wait for the
//! refill instead of failing.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

static GLOBAL: Lazy<Arc<RateLimiter>> = Lazy::new(|| Arc::new(RateLimiter::per_minute()));

struct Window {
    started: Instant,
    remaining: u32,
}

pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Limiter with the one-minute window that `max_requests_per_minute` assumes
    pub fn per_minute() -> Self {
        Self::new(Duration::from_secs(60))
    }

    /// Process-wide limiter
    pub fn global() -> Arc<RateLimiter> {
        Arc::clone(&GLOBAL)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Take one request from `key`'s budget, waiting for the next window if it
    /// is spent. A limit of zero is treated as one request per window.
    pub async fn acquire(&self, key: &str, limit: u32) {
        let limit = limit.max(1);
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let now = Instant::now();
                let window = windows.entry(key.to_string()).or_insert(Window {
                    started: now,
                    remaining: limit,
                });

                if now.duration_since(window.started) >= self.window {
                    window.started = now;
                    window.remaining = limit;
                }

                if window.remaining > 0 {
                    window.remaining -= 1;
                    return;
                }
                self.window.saturating_sub(now.duration_since(window.started))
            };

            debug!(key, wait_ms = wait.as_millis() as u64, "rate limit reached, waiting for refill");
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests left in `key`'s current window, if it has one
    pub async fn remaining(&self, key: &str) -> Option<u32> {
        let windows = self.windows.lock().await;
        windows.get(key).map(|w| {
            if w.started.elapsed() >= self.window {
                u32::MAX
            } else {
                w.remaining
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_within_budget_does_not_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let start = std::time::Instant::now();
        for _ in 0..5 {
            limiter.acquire("researcher", 5).await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.remaining("researcher").await, Some(0));
    }

    #[tokio::test]
    async fn exhausted_budget_waits_for_refill() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let start = std::time::Instant::now();
        limiter.acquire("analyst", 2).await;
        limiter.acquire("analyst", 2).await;
        limiter.acquire("analyst", 2).await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn budgets_are_per_key() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        limiter.acquire("manager", 1).await;

        let start = std::time::Instant::now();
        limiter.acquire("broker", 1).await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.remaining("manager").await, Some(0));
        assert_eq!(limiter.remaining("unknown").await, None);
    }
}
