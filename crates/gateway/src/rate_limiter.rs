//! Per-user sliding-window rate limiter
//!
//! One hour window, keyed by the anonymized `user_id`. On each request,
//! timestamps older than the window are dropped; the request is admitted
//! (and its timestamp appended) iff the remaining count is below the
//! configured limit. Bounded under steady load by opportunistic eviction
//! of emptied entries on write and a periodic sweep of idle users.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(3600);

pub struct RateLimiter {
    limit: u32,
    entries: RwLock<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drops timestamps older than the window, then admits the request iff
    /// the remaining count is below `limit`.
    pub fn check_and_record(&self, user_id: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("rate limiter lock poisoned");

        let timestamps = entries.entry(user_id.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < WINDOW);

        if timestamps.len() as u32 >= self.limit {
            if timestamps.is_empty() {
                entries.remove(user_id);
            }
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Removes per-user entries that are empty or whose newest timestamp
    /// has aged out of the window. Run periodically, not per-request.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write().expect("rate limiter lock poisoned");
        entries.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < WINDOW);
            !timestamps.is_empty()
        });
    }

    pub fn tracked_users(&self) -> usize {
        self.entries.read().expect("rate limiter lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_under_limit() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check_and_record("user-a"));
        assert!(limiter.check_and_record("user-a"));
        assert!(limiter.check_and_record("user-a"));
    }

    #[test]
    fn test_rejects_at_limit() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check_and_record("user-a"));
        assert!(limiter.check_and_record("user-a"));
        assert!(!limiter.check_and_record("user-a"));
    }

    #[test]
    fn test_users_are_independent() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check_and_record("user-a"));
        assert!(limiter.check_and_record("user-b"));
        assert!(!limiter.check_and_record("user-a"));
    }

    #[test]
    fn test_sweep_removes_empty_entries() {
        let limiter = RateLimiter::new(5);
        limiter.check_and_record("user-a");
        assert_eq!(limiter.tracked_users(), 1);
        limiter.entries.write().unwrap().get_mut("user-a").unwrap().clear();
        limiter.sweep();
        assert_eq!(limiter.tracked_users(), 0);
    }
}
