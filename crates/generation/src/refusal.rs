//! Refusal Gate
//!
//! Two independent predicates — pre-LLM (skip generation on an
//! out-of-scope question) and post-LLM (catch a generated answer that
//! hallucinated anyway) — plus a selected-text external-reference scan and
//! the canonical refusal message builder.

use regex_lite::Regex;

/// Closed set of phrases that mark a generated response as a refusal.
/// Tuning this list is a deployment concern, not a pipeline concern.
const REFUSAL_KEYWORDS: &[&str] = &[
    "don't have information",
    "does not contain information",
    "not contain sufficient information",
    "cannot answer",
    "outside the scope",
    "not mentioned in",
    "not covered in",
    "insufficient information",
    "unable to find information",
];

const EXTERNAL_REFERENCE_PATTERNS: &[&str] = &[
    r"(?i)chapter\s+\d+",
    r"(?i)module\s+\d+",
    r"(?i)section\s+\d+",
    r"(?i)see\s+chapter",
    r"(?i)as\s+mentioned\s+in\s+chapter",
    r"(?i)described\s+in\s+chapter",
];

pub const SELECTED_TEXT_REFUSAL_MESSAGE: &str =
    "The selected text does not contain sufficient information to answer this question.";

/// Why a refusal was triggered, used to pick the canonical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalReason {
    LowSimilarity,
    ExternalReference,
    InsufficientContext,
}

impl RefusalReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RefusalReason::LowSimilarity => "low_similarity",
            RefusalReason::ExternalReference => "external_reference",
            RefusalReason::InsufficientContext => "insufficient_context",
        }
    }
}

/// Whether the query came with a user-selected text excerpt, which changes
/// the refusal message regardless of the underlying reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    BookWide,
    SelectedText,
}

/// `true` iff `scores` is empty or its maximum is below `threshold`.
pub fn should_refuse(scores: &[f32], threshold: f32) -> bool {
    match scores.iter().cloned().fold(None, |acc: Option<f32>, s| {
        Some(acc.map_or(s, |m| m.max(s)))
    }) {
        None => true,
        Some(max) => max < threshold,
    }
}

/// `true` iff the lowercased response contains any refusal keyword.
pub fn is_refusal(text: &str) -> bool {
    let lowered = text.to_lowercase();
    REFUSAL_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// `true` iff the response references material outside a selected excerpt.
pub fn has_external_reference(text: &str) -> bool {
    EXTERNAL_REFERENCE_PATTERNS
        .iter()
        .any(|pattern| Regex::new(pattern).expect("static refusal pattern is valid").is_match(text))
}

/// Canonical user-visible refusal string for `{query_mode, reason}`.
/// Selected-text mode always returns the mandatory selected-text message
/// regardless of reason.
pub fn build_refusal_message(mode: QueryMode, reason: RefusalReason) -> &'static str {
    if mode == QueryMode::SelectedText {
        return SELECTED_TEXT_REFUSAL_MESSAGE;
    }

    match reason {
        RefusalReason::LowSimilarity => {
            "I don't have information about that topic in the book. Please try rephrasing your question or asking about content covered in the chapters."
        }
        RefusalReason::ExternalReference => {
            "I cannot answer questions that require information beyond the book's content."
        }
        RefusalReason::InsufficientContext => {
            "I cannot find sufficient information in the book to answer this question."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_refuse_on_empty_scores() {
        assert!(should_refuse(&[], 0.7));
    }

    #[test]
    fn test_should_refuse_below_threshold() {
        assert!(should_refuse(&[0.5, 0.6], 0.7));
    }

    #[test]
    fn test_should_not_refuse_above_threshold() {
        assert!(!should_refuse(&[0.5, 0.85], 0.7));
    }

    #[test]
    fn test_is_refusal_matches_keyword_case_insensitively() {
        assert!(is_refusal("I DON'T HAVE INFORMATION about that."));
        assert!(!is_refusal("Zero moment point is a stability criterion."));
    }

    #[test]
    fn test_external_reference_detection() {
        assert!(has_external_reference("As discussed in Chapter 4, the robot..."));
        assert!(has_external_reference("See chapter for more detail."));
        assert!(!has_external_reference("The gripper applies force at the contact point."));
    }

    #[test]
    fn test_selected_text_mode_ignores_reason() {
        let msg = build_refusal_message(QueryMode::SelectedText, RefusalReason::LowSimilarity);
        assert_eq!(msg, SELECTED_TEXT_REFUSAL_MESSAGE);
    }

    #[test]
    fn test_book_wide_messages_are_reason_specific() {
        let low = build_refusal_message(QueryMode::BookWide, RefusalReason::LowSimilarity);
        let ext = build_refusal_message(QueryMode::BookWide, RefusalReason::ExternalReference);
        assert_ne!(low, ext);
    }
}
