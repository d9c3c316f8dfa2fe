//! Citation Builder
//!
//! Consolidates multi-chunk retrieval results into ordered citations with
//! stable, Docusaurus-style anchor URLs.

use crate::retriever::RetrievedChunk;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const UNKNOWN_CHAPTER: &str = "Unknown Chapter";
const UNKNOWN_SECTION: &str = "Unknown Section";

/// One consolidated citation covering every chunk that shares its
/// `(chapter, section, section_slug, source_file)` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub chapter: String,
    pub section: String,
    pub url: String,
    pub chunk_count: usize,
    pub chunk_ids: Vec<Uuid>,
    pub max_similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    chapter: String,
    section: String,
    section_slug: String,
    source_file: String,
}

pub struct CitationBuilder;

impl CitationBuilder {
    /// Groups `chunks` by `(chapter, section, section_slug, source_file)`
    /// and emits one citation per group, ordered by the chapter's module
    /// number then by the chapter string.
    pub fn build(chunks: &[RetrievedChunk]) -> Vec<Citation> {
        let mut groups: HashMap<GroupKey, Vec<&RetrievedChunk>> = HashMap::new();

        for chunk in chunks {
            let chapter = non_empty(&chunk.chapter_title).unwrap_or(UNKNOWN_CHAPTER).to_string();
            let section = non_empty(&chunk.section).unwrap_or(UNKNOWN_SECTION).to_string();
            let section_slug = non_empty(&chunk.section_slug)
                .map(str::to_string)
                .unwrap_or_else(|| generate_slug(&section));

            let key = GroupKey {
                chapter,
                section,
                section_slug,
                source_file: chunk.source_file.clone(),
            };

            groups.entry(key).or_default().push(chunk);
        }

        let mut citations: Vec<Citation> = groups
            .into_iter()
            .map(|(key, members)| {
                let max_similarity = members
                    .iter()
                    .map(|c| c.score)
                    .fold(f32::MIN, f32::max);

                Citation {
                    chapter: key.chapter,
                    section: key.section,
                    url: build_citation_url(&key.source_file, &key.section_slug),
                    chunk_count: members.len(),
                    chunk_ids: members.iter().map(|c| c.id).collect(),
                    max_similarity,
                }
            })
            .collect();

        citations.sort_by(|a, b| {
            let order_a = (extract_chapter_order(&a.chapter), a.chapter.clone());
            let order_b = (extract_chapter_order(&b.chapter), b.chapter.clone());
            order_a.cmp(&order_b)
        });

        citations
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// `/{joined-path}#{section_slug}`, stripping `docs/` prefix, `.md` suffix,
/// and a leading `NN-` filename prefix from `source_file`. Empty
/// `source_file` produces `#unknown-section`.
fn build_citation_url(source_file: &str, section_slug: &str) -> String {
    if source_file.trim().is_empty() {
        return "#unknown-section".to_string();
    }

    let path = source_file.strip_prefix("docs/").unwrap_or(source_file);
    let path = path.strip_suffix(".md").unwrap_or(path);

    let numeric_prefix = Regex::new(r"^\d+-").unwrap();
    let mut segments: Vec<&str> = path.split('/').collect();
    if let Some(last) = segments.last_mut() {
        if let Some(stripped) = numeric_prefix.find(last) {
            *last = &last[stripped.end()..];
        }
    }
    let path = segments.join("/");

    format!("/{path}#{section_slug}")
}

/// Lowercases, strips non-word/whitespace/hyphen characters, collapses
/// whitespace/hyphen runs to a single hyphen, and trims leading/trailing
/// hyphens.
fn generate_slug(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect();

    let collapsed = Regex::new(r"[\s-]+").unwrap().replace_all(&stripped, "-").to_string();
    collapsed.trim_matches('-').to_string()
}

/// Parses `/Module\s+(\d+)/i`, defaulting to 999 when absent.
fn extract_chapter_order(chapter: &str) -> u32 {
    let pattern = Regex::new(r"(?i)module\s+(\d+)").unwrap();
    pattern
        .captures(chapter)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(999)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(chapter: &str, section: &str, slug: &str, source_file: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: Uuid::new_v4(),
            score,
            book_id: "physical-ai-robotics".to_string(),
            chapter_number: 0,
            chapter_title: chapter.to_string(),
            section: section.to_string(),
            section_slug: slug.to_string(),
            source_file: source_file.to_string(),
            content: "chunk text".to_string(),
        }
    }

    #[test]
    fn test_consolidates_same_group_into_one_citation() {
        let chunks = vec![
            chunk(
                "Module 0 - Foundations",
                "Locomotion and Motor Control",
                "locomotion-motor-control",
                "docs/chapters/module-0-foundations/04-locomotion-motor-control.md",
                0.85,
            ),
            chunk(
                "Module 0 - Foundations",
                "Locomotion and Motor Control",
                "locomotion-motor-control",
                "docs/chapters/module-0-foundations/04-locomotion-motor-control.md",
                0.78,
            ),
        ];

        let citations = CitationBuilder::build(&chunks);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].chunk_count, 2);
        assert_eq!(citations[0].max_similarity, 0.85);
        assert_eq!(
            citations[0].url,
            "/chapters/module-0-foundations/locomotion-motor-control#locomotion-motor-control"
        );
    }

    #[test]
    fn test_empty_source_file_yields_unknown_section_url() {
        let chunks = vec![chunk("Module 1", "Some Section", "some-section", "", 0.9)];
        let citations = CitationBuilder::build(&chunks);
        assert_eq!(citations[0].url, "#unknown-section");
    }

    #[test]
    fn test_ordering_by_module_number() {
        let chunks = vec![
            chunk("Module 2 - Perception", "A", "a", "docs/chapters/m2/01-a.md", 0.9),
            chunk("Module 0 - Foundations", "B", "b", "docs/chapters/m0/01-b.md", 0.9),
            chunk("Module 1 - Kinematics", "C", "c", "docs/chapters/m1/01-c.md", 0.9),
        ];
        let citations = CitationBuilder::build(&chunks);
        let chapters: Vec<&str> = citations.iter().map(|c| c.chapter.as_str()).collect();
        assert_eq!(
            chapters,
            vec!["Module 0 - Foundations", "Module 1 - Kinematics", "Module 2 - Perception"]
        );
    }

    #[test]
    fn test_missing_chapter_defaults_to_unknown() {
        let chunks = vec![chunk("", "", "", "docs/chapters/x/01-x.md", 0.5)];
        let citations = CitationBuilder::build(&chunks);
        assert_eq!(citations[0].chapter, UNKNOWN_CHAPTER);
        assert_eq!(citations[0].section, UNKNOWN_SECTION);
    }

    #[test]
    fn test_slug_generation_is_idempotent() {
        let section = "Locomotion, Motor Control & Gait!";
        let slug = generate_slug(section);
        let slug_again = generate_slug(&slug);
        assert_eq!(slug, slug_again);
    }

    #[test]
    fn test_url_has_no_spaces_or_ampersands_and_exactly_one_hash() {
        let chunks = vec![chunk(
            "Module 0",
            "A & B Section",
            "a-b-section",
            "docs/chapters/module-0/02-a-b-section.md",
            0.9,
        )];
        let url = &CitationBuilder::build(&chunks)[0].url;
        assert!(!url.contains(' '));
        assert!(!url.contains('&'));
        assert_eq!(url.matches('#').count(), 1);
        assert!(url.ends_with("#a-b-section"));
    }

    #[test]
    fn test_extract_chapter_order_defaults_to_999() {
        assert_eq!(extract_chapter_order("Appendix"), 999);
        assert_eq!(extract_chapter_order("Module 7 - Control"), 7);
    }

    #[test]
    fn test_url_determinism() {
        let a = build_citation_url("docs/chapters/module-0/04-locomotion.md", "locomotion");
        let b = build_citation_url("docs/chapters/module-0/04-locomotion.md", "locomotion");
        assert_eq!(a, b);
    }
}
