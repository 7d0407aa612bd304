//! Per-host request spacing.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Keeps consecutive requests to the same host at least `min_delay` apart.
///
/// The crawler awaits every request in sequence, so this is a plain blocking
/// pause on the single thread of control.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: DashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: DashMap::new(),
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Sleep until a request to `host` is allowed, then record it.
    pub async fn wait(&self, host: &str) {
        if self.min_delay.is_zero() {
            return;
        }

        // Copy the instant out so the map guard is not held across the sleep.
        let last = self.last_request.get(host).map(|entry| *entry);
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait_time = self.min_delay - elapsed;
                tracing::trace!(host, wait_ms = wait_time.as_millis() as u64, "throttling");
                sleep(wait_time).await;
            }
        }

        self.last_request.insert(host.to_string(), Instant::now());
    }

    pub fn tracked_hosts(&self) -> usize {
        self.last_request.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_delay_never_tracks() {
        let limiter = RateLimiter::new(Duration::ZERO);
        limiter.wait("example.com").await;
        assert_eq!(limiter.tracked_hosts(), 0);
    }

    #[tokio::test]
    async fn second_request_waits_for_delay() {
        let limiter = RateLimiter::new(Duration::from_millis(40));
        let start = Instant::now();
        limiter.wait("example.com").await;
        limiter.wait("example.com").await;
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(limiter.tracked_hosts(), 1);
    }

    #[tokio::test]
    async fn hosts_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        limiter.wait("a.example").await;
        limiter.wait("b.example").await;
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(limiter.tracked_hosts(), 2);
    }
}
