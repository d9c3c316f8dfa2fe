//! Shared application state
//!
//! Constructed once at startup and cloned (cheaply — everything inside is
//! an `Arc` or an `Arc`-backed connection pool) into every request handler.

use crate::rate_limiter::RateLimiter;
use bookrag_common::cache::AnalyticsCache;
use bookrag_common::config::AppConfig;
use bookrag_common::db::Repository;
use bookrag_common::embeddings::Embedder;
use bookrag_generation::Generator;
use bookrag_retrieval::Retriever;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repository: Repository,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub retriever: Retriever,
    pub rate_limiter: Arc<RateLimiter>,
    pub analytics_cache: Arc<AnalyticsCache>,
}

/// Derives a human-readable book title from its slug id, e.g.
/// `physical-ai-robotics` -> `Physical Ai Robotics`. There is no separate
/// book-metadata table in this deployment; the slug is the only identifier
/// persisted alongside chunks.
pub fn book_title_from_id(book_id: &str) -> String {
    book_id
        .split(['-', '_'])
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_title_from_id() {
        assert_eq!(book_title_from_id("physical-ai-robotics"), "Physical Ai Robotics");
        assert_eq!(book_title_from_id("rust_basics"), "Rust Basics");
    }
}
