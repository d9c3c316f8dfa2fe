//! Vector Index Client
//!
//! Wraps pgvector cosine-distance search behind the collection/upsert/search
//! surface the query pipeline expects, following
//! `bookrag-common`'s `Repository::vector_search` raw-SQL pattern. The
//! payload index only covers `book_id`; a `chapter_number` filter is applied
//! by over-fetching and filtering in memory (see `search`).

use bookrag_common::db::{ChunkResult, Repository};
use bookrag_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chunk and its embedding, as produced by the (external) ingestion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub embedding: Vec<f32>,
    pub book_id: String,
    pub chapter_number: i32,
    pub chapter_title: String,
    pub section: String,
    pub section_slug: String,
    pub source_file: String,
    pub content: String,
}

/// A scored search result: id, score, and the chunk's payload fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
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

impl From<ChunkResult> for ScoredPoint {
    fn from(r: ChunkResult) -> Self {
        Self {
            id: r.chunk_id,
            score: r.score as f32,
            book_id: r.book_id,
            chapter_number: r.chapter_number,
            chapter_title: r.chapter_title,
            section: r.section,
            section_slug: r.section_slug,
            source_file: r.source_file,
            content: r.content,
        }
    }
}

/// Over-fetch multiplier used when a `chapter_number` filter must be applied
/// in memory because the payload index only covers `book_id`.
const CHAPTER_FILTER_OVERFETCH: usize = 4;

#[derive(Clone)]
pub struct VectorIndexClient {
    repository: Repository,
}

impl VectorIndexClient {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Ensures the backing `chunks` table exists with a vector column of
    /// the given dimension. A no-op if it's already there — schema
    /// migration is otherwise out of this service's scope.
    pub async fn ensure_collection(&self, dim: usize) -> Result<()> {
        let ddl = format!(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id UUID PRIMARY KEY,
                book_id TEXT NOT NULL,
                chapter_number INTEGER NOT NULL,
                chapter_title TEXT NOT NULL,
                section TEXT NOT NULL,
                section_slug TEXT NOT NULL,
                source_file TEXT NOT NULL,
                content TEXT NOT NULL,
                embedding VECTOR({dim}) NOT NULL
            )
            "#
        );

        let create_index = "CREATE INDEX IF NOT EXISTS chunks_book_id_idx ON chunks (book_id)";

        self.repository
            .execute_ddl(&ddl)
            .await
            .and(self.repository.execute_ddl(create_index).await)
    }

    /// Inserts or replaces chunk points.
    pub async fn upsert(&self, points: &[ChunkPoint]) -> Result<()> {
        for point in points {
            self.repository
                .upsert_chunk(
                    point.id,
                    &point.book_id,
                    point.chapter_number,
                    &point.chapter_title,
                    &point.section,
                    &point.section_slug,
                    &point.source_file,
                    &point.content,
                    &point.embedding,
                )
                .await?;
        }
        Ok(())
    }

    /// Cosine-similarity ANN search scoped to `book_id`, with an optional
    /// equality filter on `chapter_number` applied post-search (see
    /// module docs).
    pub async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        score_threshold: f32,
        book_id: &str,
        chapter_number: Option<i32>,
    ) -> Result<Vec<ScoredPoint>> {
        if vector.is_empty() {
            return Err(AppError::RetrievalError {
                message: "search vector must not be empty".to_string(),
            });
        }

        let fetch_limit = match chapter_number {
            Some(_) => top_k * CHAPTER_FILTER_OVERFETCH,
            None => top_k,
        };

        let raw = self
            .repository
            .vector_search(vector, fetch_limit, book_id)
            .await?;

        let mut points: Vec<ScoredPoint> = raw
            .into_iter()
            .map(ScoredPoint::from)
            .filter(|p| p.score >= score_threshold)
            .filter(|p| chapter_number.map_or(true, |n| p.chapter_number == n))
            .collect();

        points.truncate(top_k);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_result_conversion_preserves_score() {
        let result = ChunkResult {
            chunk_id: Uuid::new_v4(),
            book_id: "physical-ai-robotics".to_string(),
            chapter_number: 0,
            chapter_title: "Module 0 - Foundations".to_string(),
            section: "Locomotion and Motor Control".to_string(),
            section_slug: "locomotion-motor-control".to_string(),
            source_file: "docs/chapters/module-0/04-locomotion.md".to_string(),
            content: "chunk text".to_string(),
            score: 0.85,
        };
        let point: ScoredPoint = result.into();
        assert_eq!(point.score, 0.85);
        assert_eq!(point.chapter_number, 0);
    }
}
