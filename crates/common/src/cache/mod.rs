//! Analytics summary cache
//!
//! The analytics endpoint aggregates across the query history, which is
//! expensive to recompute on every request. Results are cached in-process,
//! keyed by an MD5 digest of the query's date range and book filter, with a
//! short TTL and a bound on total entries so the cache can't grow without
//! limit under a scan of distinct date ranges.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Entries older than this are treated as misses even if still present.
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Soft cap on the number of live entries.
const MAX_ENTRIES: usize = 1000;

/// Number of oldest entries evicted once `MAX_ENTRIES` is exceeded.
const EVICT_BATCH: usize = 100;

struct Entry {
    value: String,
    inserted_at: Instant,
}

/// Bounded, TTL'd in-memory cache for analytics summaries.
///
/// Values are stored pre-serialized to JSON so the cache itself stays
/// generic over the summary type without needing `Any` downcasting.
pub struct AnalyticsCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl Default for AnalyticsCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl AnalyticsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Build the cache key for a summary request: MD5 of `start|end|book_or_all`.
    pub fn key(start: &str, end: &str, book_id: Option<&str>) -> String {
        let scope = book_id.unwrap_or("all");
        let digest = md5::compute(format!("{start}|{end}|{scope}"));
        format!("{digest:x}")
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.read().expect("cache lock poisoned");
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        serde_json::from_str(&entry.value).ok()
    }

    pub fn set<T: Serialize>(&self, key: String, value: &T) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };

        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(
            key,
            Entry {
                value: json,
                inserted_at: Instant::now(),
            },
        );

        if entries.len() > MAX_ENTRIES {
            let mut by_age: Vec<(String, Instant)> = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.inserted_at))
                .collect();
            by_age.sort_by_key(|(_, t)| *t);
            for (stale_key, _) in by_age.into_iter().take(EVICT_BATCH) {
                entries.remove(&stale_key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_stable_for_same_inputs() {
        let a = AnalyticsCache::key("2024-01-01", "2024-02-01", Some("book-1"));
        let b = AnalyticsCache::key("2024-01-01", "2024-02-01", Some("book-1"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_varies_with_scope() {
        let with_book = AnalyticsCache::key("2024-01-01", "2024-02-01", Some("book-1"));
        let all_books = AnalyticsCache::key("2024-01-01", "2024-02-01", None);
        assert_ne!(with_book, all_books);
    }

    #[test]
    fn test_set_then_get_roundtrips() {
        let cache = AnalyticsCache::default();
        let key = AnalyticsCache::key("2024-01-01", "2024-02-01", None);
        cache.set(key.clone(), &json!({"total_queries": 42}));
        let value: serde_json::Value = cache.get(&key).expect("value should be present");
        assert_eq!(value["total_queries"], 42);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = AnalyticsCache::new(Duration::from_millis(1));
        let key = AnalyticsCache::key("2024-01-01", "2024-02-01", None);
        cache.set(key.clone(), &json!({"total_queries": 1}));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get::<serde_json::Value>(&key).is_none());
    }

    #[test]
    fn test_overflow_evicts_oldest_batch() {
        let cache = AnalyticsCache::default();
        for i in 0..(MAX_ENTRIES + 1) {
            cache.set(format!("key-{i}"), &json!({"i": i}));
        }
        assert!(cache.len() <= MAX_ENTRIES);
        assert!(cache.get::<serde_json::Value>("key-0").is_none());
    }
}
