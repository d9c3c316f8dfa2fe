//! Analytics summary math
//!
//! Pure helpers for the percentile and topic-distribution computations the
//! SQL layer can't express directly: `Repository` returns raw rows, this
//! module turns them into the summary's derived fields.

use std::collections::HashMap;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "what", "why", "how", "when", "where", "who",
    "which", "does", "do", "did", "to", "of", "in", "on", "for", "and", "or", "with", "this",
    "that", "can", "could", "would", "should", "i", "it", "its", "be", "been", "about", "as",
];

/// Nearest-rank percentile over a pre-sorted ascending slice; 0 for empty.
pub fn percentile(sorted_values: &[i64], p: f64) -> i64 {
    if sorted_values.is_empty() {
        return 0;
    }
    let rank = ((p / 100.0) * (sorted_values.len() as f64 - 1.0)).round() as usize;
    sorted_values[rank.min(sorted_values.len() - 1)]
}

/// Top-10 keyword frequency over query texts, stopword-filtered and
/// rank-limited.
pub fn top_topics(query_texts: &[String], limit: usize) -> Vec<(String, u32)> {
    let mut counts: HashMap<String, u32> = HashMap::new();

    for text in query_texts {
        for word in text.to_lowercase().split_whitespace() {
            let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.len() < 3 || STOPWORDS.contains(&cleaned.as_str()) {
                continue;
            }
            *counts.entry(cleaned).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

/// `total_queries * 2.5`, the estimated student-time-saved metric.
pub fn estimated_minutes_saved(total_queries: u64) -> f64 {
    total_queries as f64 * 2.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_of_empty_is_zero() {
        assert_eq!(percentile(&[], 95.0), 0);
    }

    #[test]
    fn test_percentile_p50_of_sorted_values() {
        let values = vec![100, 200, 300, 400, 500];
        assert_eq!(percentile(&values, 50.0), 300);
    }

    #[test]
    fn test_percentile_p95_near_top() {
        let values: Vec<i64> = (1..=100).collect();
        let p95 = percentile(&values, 95.0);
        assert!(p95 >= 94 && p95 <= 100);
    }

    #[test]
    fn test_top_topics_filters_stopwords_and_short_words() {
        let texts = vec![
            "What is Zero Moment Point?".to_string(),
            "What is a Zero Moment Point used for?".to_string(),
        ];
        let topics = top_topics(&texts, 10);
        let words: Vec<&str> = topics.iter().map(|(w, _)| w.as_str()).collect();
        assert!(words.contains(&"zero"));
        assert!(!words.contains(&"what"));
        assert!(!words.contains(&"is"));
    }

    #[test]
    fn test_top_topics_respects_limit() {
        let texts: Vec<String> = (0..20).map(|i| format!("keyword{i} appears once")).collect();
        let topics = top_topics(&texts, 10);
        assert!(topics.len() <= 10);
    }

    #[test]
    fn test_estimated_minutes_saved() {
        assert_eq!(estimated_minutes_saved(100), 250.0);
    }
}
