//! Retriever
//!
//! Thin orchestration over the Vector Index Client: runs the similarity
//! search, derives the response's confidence score, and projects each
//! chunk to a simple source reference. Grouped, URL-bearing citations
//! live in `citation::CitationBuilder`.

use crate::vector_client::{ScoredPoint, VectorIndexClient};
use bookrag_common::errors::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.7;

/// A retrieved chunk, ordered by descending score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub id: Uuid,
    pub score: f32,
    pub book_id: String,
    pub chapter_number: i32,
    pub chapter_title: String,
    pub section: String,
    pub section_slug: String,
    pub source_file: String,
    pub content: String,
}

/// A simple per-chunk source reference: chapter/section plus a short
/// human-readable citation string. Grouped, URL-bearing citations are
/// built separately by `citation::CitationBuilder`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReference {
    pub chunk_id: Uuid,
    pub chapter: String,
    pub section: String,
    pub citation: String,
}

impl From<ScoredPoint> for RetrievedChunk {
    fn from(p: ScoredPoint) -> Self {
        Self {
            id: p.id,
            score: p.score,
            book_id: p.book_id,
            chapter_number: p.chapter_number,
            chapter_title: p.chapter_title,
            section: p.section,
            section_slug: p.section_slug,
            source_file: p.source_file,
            content: p.content,
        }
    }
}

#[derive(Clone)]
pub struct Retriever {
    client: VectorIndexClient,
}

impl Retriever {
    pub fn new(client: VectorIndexClient) -> Self {
        Self { client }
    }

    /// Retrieves up to `top_k` chunks scoring at least `threshold`,
    /// ordered by descending score. Never errors on an empty result; only
    /// on index connectivity failure (propagated from the client).
    pub async fn retrieve(
        &self,
        embedding: &[f32],
        book_id: &str,
        chapter_number: Option<i32>,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        let points = self
            .client
            .search(embedding, top_k, threshold, book_id, chapter_number)
            .await?;

        Ok(points.into_iter().map(RetrievedChunk::from).collect())
    }

    /// Mean of the chunks' similarity scores, rounded to 2 decimals; 0 for
    /// an empty list. Used as the response's `confidence_score`.
    pub fn confidence_score(chunks: &[RetrievedChunk]) -> f32 {
        if chunks.is_empty() {
            return 0.0;
        }
        let sum: f32 = chunks.iter().map(|c| c.score).sum();
        let mean = sum / chunks.len() as f32;
        (mean * 100.0).round() / 100.0
    }

    /// Projects each chunk to a per-chunk source reference (chapter,
    /// section, a short citation string, and the chunk id).
    pub fn extract_source_references(chunks: &[RetrievedChunk]) -> Vec<SourceReference> {
        chunks
            .iter()
            .map(|c| SourceReference {
                chunk_id: c.id,
                chapter: c.chapter_number.to_string(),
                section: c.section.clone(),
                citation: format_citation(c.chapter_number, &c.section),
            })
            .collect()
    }
}

/// "Chapter {n}, {section}", or just "Chapter {n}" when section is empty.
fn format_citation(chapter_number: i32, section: &str) -> String {
    if section.is_empty() {
        format!("Chapter {chapter_number}")
    } else {
        format!("Chapter {chapter_number}, {section}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(score: f32) -> RetrievedChunk {
        RetrievedChunk {
            id: Uuid::new_v4(),
            score,
            book_id: "physical-ai-robotics".to_string(),
            chapter_number: 0,
            chapter_title: "Module 0 - Foundations".to_string(),
            section: "Locomotion and Motor Control".to_string(),
            section_slug: "locomotion-motor-control".to_string(),
            source_file: "docs/chapters/module-0/04-locomotion.md".to_string(),
            content: "chunk text".to_string(),
        }
    }

    #[test]
    fn test_confidence_score_is_mean_rounded() {
        let chunks = vec![chunk(0.85), chunk(0.78)];
        assert_eq!(Retriever::confidence_score(&chunks), 0.82);
    }

    #[test]
    fn test_confidence_score_of_empty_is_zero() {
        assert_eq!(Retriever::confidence_score(&[]), 0.0);
    }

    #[test]
    fn test_extract_source_references_matches_length() {
        let chunks = vec![chunk(0.9), chunk(0.8)];
        let refs = Retriever::extract_source_references(&chunks);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_extract_source_references_formats_citation() {
        let refs = Retriever::extract_source_references(&[chunk(0.9)]);
        assert_eq!(refs[0].chapter, "0");
        assert_eq!(refs[0].citation, "Chapter 0, Locomotion and Motor Control");
    }

    #[test]
    fn test_format_citation_omits_empty_section() {
        assert_eq!(format_citation(3, ""), "Chapter 3");
    }
}
