//! Per-identity request budget.
//!
//! Fixed-window counter keyed by an opaque identity string. The check
//! never fails; denial is a normal decision the caller acts on. The
//! whole check-and-increment runs inside one lock so concurrent calls
//! for the same identity each consume exactly one unit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;

/// Outcome of one budget check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this call.
    pub remaining: u32,
    /// When the current window ends and the budget refills.
    pub reset_at: Instant,
}

#[derive(Debug)]
struct Entry {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window rate limiter. Identities are fully independent.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Check the budget for `identity` and consume one unit if allowed.
    pub fn check_and_consume(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, Instant::now())
    }

    fn check_at(&self, identity: &str, now: Instant) -> RateLimitDecision {
        let mut entries = self.entries.lock().unwrap();

        match entries.get_mut(identity) {
            // An entry whose window has passed is treated as absent.
            Some(entry) if entry.reset_at > now => {
                if entry.count >= self.config.max_requests {
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at: entry.reset_at,
                    }
                } else {
                    entry.count += 1;
                    RateLimitDecision {
                        allowed: true,
                        remaining: self.config.max_requests - entry.count,
                        reset_at: entry.reset_at,
                    }
                }
            }
            _ => {
                let reset_at = now + self.config.window;
                if self.config.max_requests == 0 {
                    return RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_at,
                    };
                }
                entries.insert(
                    identity.to_string(),
                    Entry {
                        count: 1,
                        reset_at,
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: self.config.max_requests - 1,
                    reset_at,
                }
            }
        }
    }

    /// Drop entries whose window has passed, bounding table size.
    pub fn sweep_expired(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        self.entries
            .lock()
            .unwrap()
            .retain(|_, entry| entry.reset_at > now);
    }

    /// Run the sweep on a fixed period. The caller owns the handle and
    /// aborts it when the limiter is no longer needed.
    pub fn spawn_sweeper(limiter: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep_expired();
            }
        })
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(window_secs: u64, max_requests: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            window: Duration::from_secs(window_secs),
            max_requests,
        })
    }

    #[test]
    fn rejects_after_budget_is_spent() {
        let limiter = limiter(60, 3);
        let now = Instant::now();

        for i in 0..3 {
            let decision = limiter.check_at("user-a", now);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 2 - i);
        }

        let denied = limiter.check_at("user-a", now);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, now + Duration::from_secs(60));
    }

    #[test]
    fn identities_are_independent() {
        let limiter = limiter(60, 2);
        let now = Instant::now();

        limiter.check_at("user-a", now);
        limiter.check_at("user-a", now);
        assert!(!limiter.check_at("user-a", now).allowed);

        let other = limiter.check_at("user-b", now);
        assert!(other.allowed);
        assert_eq!(other.remaining, 1);
    }

    #[test]
    fn expired_window_starts_fresh() {
        let limiter = limiter(60, 2);
        let now = Instant::now();

        limiter.check_at("user-a", now);
        limiter.check_at("user-a", now);
        assert!(!limiter.check_at("user-a", now).allowed);

        let later = now + Duration::from_secs(61);
        let decision = limiter.check_at("user-a", later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(decision.reset_at, later + Duration::from_secs(60));
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let limiter = limiter(60, 2);
        let now = Instant::now();

        limiter.check_at("stale", now);
        limiter.check_at("fresh", now + Duration::from_secs(30));
        assert_eq!(limiter.entry_count(), 2);

        limiter.sweep_at(now + Duration::from_secs(61));
        assert_eq!(limiter.entry_count(), 1);
    }

    #[test]
    fn zero_budget_always_denies() {
        let limiter = limiter(60, 0);
        let decision = limiter.check_at("user-a", Instant::now());
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
