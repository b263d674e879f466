//! Sliding-window admission limiter for stream connections.
//!
//! Each client identity keeps the timestamps of its admitted connections.
//! On every check, timestamps older than the window are evicted before the
//! remaining count is compared with the limit, so the window slides with
//! `now` instead of resetting at fixed boundaries.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Identities tracked before fully stale histories are pruned.
const PRUNE_THRESHOLD: usize = 1024;

/// Rate limit configuration
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum admitted connections per identity within `window`
    pub max_connections: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_connections: usize, window: Duration) -> Self {
        Self {
            max_connections,
            window,
        }
    }
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit one connection for `identity` if it is under the limit.
    pub fn is_allowed(&self, identity: &str) -> bool {
        self.is_allowed_at(identity, Instant::now())
    }

    /// Same as [`is_allowed`](Self::is_allowed) with an explicit clock.
    pub fn is_allowed_at(&self, identity: &str, now: Instant) -> bool {
        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune(now);
        }

        let window = self.config.window;
        let mut history = self.windows.entry(identity.to_owned()).or_default();
        while history
            .front()
            .is_some_and(|&ts| now.saturating_duration_since(ts) >= window)
        {
            history.pop_front();
        }

        if history.len() >= self.config.max_connections {
            tracing::debug!(
                identity,
                recent = history.len(),
                max = self.config.max_connections,
                "Connection denied by rate limiter"
            );
            return false;
        }

        history.push_back(now);
        true
    }

    /// Number of identities currently tracked.
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Drop identities whose every timestamp has left the window.
    pub fn prune(&self, now: Instant) {
        let window = self.config.window;
        self.windows.retain(|_, history| {
            history
                .back()
                .is_some_and(|&ts| now.saturating_duration_since(ts) < window)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: usize, window_ms: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(max, Duration::from_millis(window_ms)))
    }

    #[test]
    fn test_fourth_connection_in_burst_is_denied() {
        let rl = limiter(3, 1000);
        let t0 = Instant::now();

        let results: Vec<bool> = (0..4)
            .map(|i| rl.is_allowed_at("127.0.0.1", t0 + Duration::from_millis(i * 30)))
            .collect();
        assert_eq!(results, vec![true, true, true, false]);
    }

    #[test]
    fn test_allowed_again_after_window_elapses() {
        let rl = limiter(3, 1000);
        let t0 = Instant::now();
        for i in 0..4 {
            rl.is_allowed_at("127.0.0.1", t0 + Duration::from_millis(i * 30));
        }

        assert!(rl.is_allowed_at("127.0.0.1", t0 + Duration::from_millis(1100)));
    }

    #[test]
    fn test_window_slides_instead_of_resetting() {
        let rl = limiter(2, 1000);
        let t0 = Instant::now();

        assert!(rl.is_allowed_at("c", t0));
        assert!(rl.is_allowed_at("c", t0 + Duration::from_millis(900)));
        // t0 has aged out, the 900ms entry has not.
        assert!(rl.is_allowed_at("c", t0 + Duration::from_millis(1000)));
        assert!(!rl.is_allowed_at("c", t0 + Duration::from_millis(1001)));
        assert!(rl.is_allowed_at("c", t0 + Duration::from_millis(1900)));
    }

    #[test]
    fn test_denials_are_not_recorded() {
        let rl = limiter(1, 1000);
        let t0 = Instant::now();

        assert!(rl.is_allowed_at("c", t0));
        for i in 1..10 {
            assert!(!rl.is_allowed_at("c", t0 + Duration::from_millis(i * 50)));
        }
        // Only the single admitted timestamp has to age out.
        assert!(rl.is_allowed_at("c", t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn test_identities_are_independent() {
        let rl = limiter(1, 1000);
        let t0 = Instant::now();

        assert!(rl.is_allowed_at("10.0.0.1", t0));
        assert!(!rl.is_allowed_at("10.0.0.1", t0));
        assert!(rl.is_allowed_at("10.0.0.2", t0));
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let rl = limiter(0, 1000);
        assert!(!rl.is_allowed("anyone"));
    }

    #[test]
    fn test_prune_drops_stale_identities() {
        let rl = limiter(5, 1000);
        let t0 = Instant::now();
        rl.is_allowed_at("old", t0);
        rl.is_allowed_at("fresh", t0 + Duration::from_millis(900));

        rl.prune(t0 + Duration::from_millis(1500));
        assert_eq!(rl.tracked_identities(), 1);
    }

    #[test]
    fn test_lazy_prune_bounds_identity_count() {
        let rl = limiter(5, 1000);
        let t0 = Instant::now();
        for i in 0..=PRUNE_THRESHOLD {
            rl.is_allowed_at(&format!("client-{i}"), t0);
        }
        assert!(rl.tracked_identities() > PRUNE_THRESHOLD);

        rl.is_allowed_at("late", t0 + Duration::from_secs(5));
        assert_eq!(rl.tracked_identities(), 1);
    }
}
