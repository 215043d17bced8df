//! Sliding-window request limiter keyed by client address.
//!
//! Each key maps to the timestamps of its accepted requests inside the
//! current window. Timestamps age out as the window slides; keys with no
//! remaining timestamps are dropped by [`SlidingWindowLimiter::prune`].

use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        /// Time until the oldest counted request leaves the window.
        reset_after: Duration,
    },
    Limited {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

pub struct SlidingWindowLimiter {
    max_requests: u32,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            hits: DashMap::new(),
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    /// Count a request for `key` at `now` if the window has room.
    ///
    /// Rejected requests are not recorded. The entry guard holds the shard
    /// lock, so evict/compare/record is atomic per key.
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut entry = self.hits.entry(key.to_string()).or_default();
        let timestamps = entry.value_mut();
        evict_expired(timestamps, now, self.window);

        let used = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        if used < self.max_requests {
            timestamps.push_back(now);
            let oldest = timestamps.front().copied().unwrap_or(now);
            RateLimitDecision::Allowed {
                limit: self.max_requests,
                remaining: self.max_requests - used - 1,
                reset_after: self.time_left(oldest, now),
            }
        } else {
            let oldest = timestamps.front().copied().unwrap_or(now);
            RateLimitDecision::Limited {
                limit: self.max_requests,
                retry_after: self.time_left(oldest, now),
            }
        }
    }

    /// Drop keys whose requests have all aged out of the window.
    pub fn prune(&self, now: Instant) {
        let window = self.window;
        self.hits.retain(|_, timestamps| {
            evict_expired(timestamps, now, window);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }

    fn time_left(&self, oldest: Instant, now: Instant) -> Duration {
        self.window
            .saturating_sub(now.saturating_duration_since(oldest))
    }
}

fn evict_expired(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

/// Round a wait up to whole seconds, never reporting zero.
pub fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    let rounded = if duration.subsec_nanos() > 0 { secs + 1 } else { secs };
    rounded.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_allows_up_to_limit_then_rejects() {
        let limiter = SlidingWindowLimiter::new(10, WINDOW);
        let now = Instant::now();

        for i in 0..10 {
            let decision = limiter.check_at("1.2.3.4", now);
            match decision {
                RateLimitDecision::Allowed { remaining, .. } => assert_eq!(remaining, 9 - i),
                other => panic!("request {} rejected: {:?}", i, other),
            }
        }

        assert!(!limiter.check_at("1.2.3.4", now).is_allowed());
    }

    #[test]
    fn test_rejected_requests_are_not_counted() {
        let limiter = SlidingWindowLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.check_at("k", start).is_allowed());
        for offset in 1..5 {
            assert!(!limiter
                .check_at("k", start + Duration::from_secs(offset))
                .is_allowed());
        }

        // Only the first request occupies the window.
        assert!(limiter.check_at("k", start + WINDOW).is_allowed());
    }

    #[test]
    fn test_window_boundary() {
        let limiter = SlidingWindowLimiter::new(2, WINDOW);
        let start = Instant::now();

        assert!(limiter.check_at("k", start).is_allowed());
        assert!(limiter
            .check_at("k", start + Duration::from_secs(30))
            .is_allowed());

        let just_before = start + WINDOW - Duration::from_millis(1);
        assert!(!limiter.check_at("k", just_before).is_allowed());

        // The first hit ages out exactly one window later; the second still counts.
        assert!(limiter.check_at("k", start + WINDOW).is_allowed());
        assert!(!limiter.check_at("k", start + WINDOW).is_allowed());
    }

    #[test]
    fn test_window_slides_instead_of_resetting() {
        let limiter = SlidingWindowLimiter::new(3, WINDOW);
        let start = Instant::now();

        limiter.check_at("k", start);
        limiter.check_at("k", start + Duration::from_secs(20));
        limiter.check_at("k", start + Duration::from_secs(40));

        // Only the hit at t=0 has expired at t=60.
        let at_sixty = start + Duration::from_secs(60);
        assert!(limiter.check_at("k", at_sixty).is_allowed());
        assert!(!limiter.check_at("k", at_sixty).is_allowed());
    }

    #[test]
    fn test_keys_are_isolated() {
        let limiter = SlidingWindowLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.check_at("10.0.0.1", now).is_allowed());
        assert!(!limiter.check_at("10.0.0.1", now).is_allowed());
        assert!(limiter.check_at("10.0.0.2", now).is_allowed());
    }

    #[test]
    fn test_retry_after_tracks_oldest_hit() {
        let limiter = SlidingWindowLimiter::new(1, WINDOW);
        let start = Instant::now();

        limiter.check_at("k", start);
        match limiter.check_at("k", start + Duration::from_secs(45)) {
            RateLimitDecision::Limited { retry_after, limit } => {
                assert_eq!(limit, 1);
                assert_eq!(retry_after, Duration::from_secs(15));
            }
            other => panic!("expected limited, got {:?}", other),
        }
    }

    #[test]
    fn test_prune_drops_idle_keys() {
        let limiter = SlidingWindowLimiter::new(5, WINDOW);
        let start = Instant::now();

        limiter.check_at("old", start);
        limiter.check_at("fresh", start + Duration::from_secs(50));
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.prune(start + WINDOW);
        assert_eq!(limiter.tracked_keys(), 1);

        limiter.prune(start + WINDOW * 2);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_limit() {
        let limiter = std::sync::Arc::new(SlidingWindowLimiter::new(10, WINDOW));
        let now = Instant::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..10)
                        .filter(|_| limiter.check_at("shared", now).is_allowed())
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_whole_seconds_rounds_up() {
        assert_eq!(whole_seconds(Duration::from_millis(1)), 1);
        assert_eq!(whole_seconds(Duration::from_millis(1500)), 2);
        assert_eq!(whole_seconds(Duration::from_secs(15)), 15);
        assert_eq!(whole_seconds(Duration::ZERO), 1);
    }
}
