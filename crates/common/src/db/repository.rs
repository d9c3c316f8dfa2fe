//! Repository pattern for database operations
//!
//! Provides the data-access surface the query pipeline needs: the pgvector
//! similarity search backing the Vector Index Client, and the append-only
//! audit inserts backing the Audit Log Writer. Analytics aggregation reads
//! the same tables with plain SQL; percentile/topic math is done in the
//! caller since it isn't expressible as a single query.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, Set, Statement,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single scored chunk returned from vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_id: Uuid,
    pub book_id: String,
    pub chapter_number: i32,
    pub chapter_title: String,
    pub section: String,
    pub section_slug: String,
    pub source_file: String,
    pub content: String,
    pub score: f64,
}

fn embedding_literal(embedding: &[f32]) -> String {
    format!(
        "[{}]",
        embedding
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    )
}

fn row_to_chunk_result(row: sea_orm::QueryResult) -> Option<ChunkResult> {
    Some(ChunkResult {
        chunk_id: row.try_get_by_index::<Uuid>(0).ok()?,
        book_id: row.try_get_by_index::<String>(1).ok()?,
        chapter_number: row.try_get_by_index::<i32>(2).ok()?,
        chapter_title: row.try_get_by_index::<String>(3).ok()?,
        section: row.try_get_by_index::<String>(4).ok()?,
        section_slug: row.try_get_by_index::<String>(5).ok()?,
        source_file: row.try_get_by_index::<String>(6).ok()?,
        content: row.try_get_by_index::<String>(7).ok()?,
        score: row.try_get_by_index::<f64>(8).ok()?,
    })
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    /// Runs a DDL statement with no bound parameters (table/index creation).
    pub async fn execute_ddl(&self, sql: &str) -> Result<()> {
        self.write_conn().execute_unprepared(sql).await?;
        Ok(())
    }

    /// Inserts or replaces one chunk row, used by the vector index client's
    /// `upsert`.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_chunk(
        &self,
        id: Uuid,
        book_id: &str,
        chapter_number: i32,
        chapter_title: &str,
        section: &str,
        section_slug: &str,
        source_file: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let embedding_str = embedding_literal(embedding);

        let sql = r#"
            INSERT INTO chunks (
                id, book_id, chapter_number, chapter_title, section,
                section_slug, source_file, content, embedding
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::vector)
            ON CONFLICT (id) DO UPDATE SET
                book_id = EXCLUDED.book_id,
                chapter_number = EXCLUDED.chapter_number,
                chapter_title = EXCLUDED.chapter_title,
                section = EXCLUDED.section,
                section_slug = EXCLUDED.section_slug,
                source_file = EXCLUDED.source_file,
                content = EXCLUDED.content,
                embedding = EXCLUDED.embedding
        "#;

        let values: Vec<sea_orm::Value> = vec![
            id.into(),
            book_id.into(),
            chapter_number.into(),
            chapter_title.into(),
            section.into(),
            section_slug.into(),
            source_file.into(),
            content.into(),
            embedding_str.into(),
        ];

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);
        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Vector search
    // ========================================================================

    /// Cosine-similarity ANN search over `chunks`, optionally filtered by
    /// book and chapter. `limit` is the raw fetch size: callers that need
    /// the `chapter_number` over-fetch/post-filter behavior pass
    /// `top_k * 4` and filter client-side, since the payload index covers
    /// only `book_id`.
    pub async fn vector_search(
        &self,
        embedding: &[f32],
        limit: usize,
        book_id: &str,
    ) -> Result<Vec<ChunkResult>> {
        let embedding_str = embedding_literal(embedding);

        let sql = r#"
            SELECT
                c.id as chunk_id,
                c.book_id,
                c.chapter_number,
                c.chapter_title,
                c.section,
                c.section_slug,
                c.source_file,
                c.content,
                1 - (c.embedding <=> $1::vector) as score
            FROM chunks c
            WHERE c.embedding IS NOT NULL
              AND c.book_id = $3
            ORDER BY c.embedding <=> $1::vector
            LIMIT $2
        "#;

        let values: Vec<sea_orm::Value> = vec![
            embedding_str.into(),
            (limit as i32).into(),
            book_id.into(),
        ];

        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, values);

        let results = self
            .read_conn()
            .query_all(stmt)
            .await?
            .into_iter()
            .filter_map(row_to_chunk_result)
            .collect();

        Ok(results)
    }

    // ========================================================================
    // Audit trail: append-only inserts, one call per request per table
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_query(
        &self,
        query_id: Uuid,
        user_id: &str,
        ip_address_hash: &str,
        query_text: &str,
        selected_text: Option<&str>,
        query_embedding: Option<&[f32]>,
        book_id: &str,
        chapter_number: Option<i32>,
        page_url: Option<&str>,
    ) -> Result<Query> {
        let model = QueryActiveModel {
            id: Set(query_id),
            user_id: Set(user_id.to_string()),
            ip_address_hash: Set(ip_address_hash.to_string()),
            query_text: Set(query_text.to_string()),
            selected_text: Set(selected_text.map(str::to_string)),
            query_embedding: Set(query_embedding.map(|e| serde_json::json!(e))),
            book_id: Set(book_id.to_string()),
            chapter_number: Set(chapter_number),
            page_url: Set(page_url.map(str::to_string)),
            created_at: Set(Utc::now().into()),
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn insert_retrieved_context(
        &self,
        query_id: Uuid,
        chunk_ids: &[Uuid],
        similarity_scores: &[f32],
        top_k: usize,
        similarity_threshold: f32,
        chapter_filter: Option<i32>,
    ) -> Result<RetrievedContext> {
        let model = RetrievedContextActiveModel {
            id: Set(Uuid::new_v4()),
            query_id: Set(query_id),
            chunk_ids: Set(serde_json::json!(chunk_ids)),
            similarity_scores: Set(serde_json::json!(similarity_scores)),
            top_k: Set(top_k as i32),
            similarity_threshold: Set(similarity_threshold),
            chapter_filter: Set(chapter_filter.map(|n| n.to_string())),
            created_at: Set(Utc::now().into()),
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_query_response(
        &self,
        query_id: Uuid,
        response_text: &str,
        source_references: &serde_json::Value,
        generation_params: &serde_json::Value,
        latency_ms: i64,
        confidence_score: f32,
        refusal_triggered: bool,
        refusal_reason: Option<&str>,
    ) -> Result<QueryResponse> {
        let model = QueryResponseActiveModel {
            id: Set(Uuid::new_v4()),
            query_id: Set(query_id),
            response_text: Set(response_text.to_string()),
            source_references: Set(source_references.clone()),
            generation_params: Set(generation_params.clone()),
            latency_ms: Set(latency_ms),
            confidence_score: Set(confidence_score),
            refusal_triggered: Set(refusal_triggered),
            refusal_reason: Set(refusal_reason.map(str::to_string)),
            created_at: Set(Utc::now().into()),
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn insert_feedback(
        &self,
        response_id: Uuid,
        rating: FeedbackRating,
        comment: Option<&str>,
    ) -> Result<UserFeedback> {
        let model = UserFeedbackActiveModel {
            id: Set(Uuid::new_v4()),
            response_id: Set(response_id),
            rating: Set(rating),
            comment: Set(comment.map(str::to_string)),
            created_at: Set(Utc::now().into()),
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    pub async fn find_query_response(&self, response_id: Uuid) -> Result<Option<QueryResponse>> {
        QueryResponseEntity::find_by_id(response_id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Analytics aggregation
    // ========================================================================

    /// Count of queries in `[start, end)`, optionally scoped to one book.
    pub async fn count_queries(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        book_id: Option<&str>,
    ) -> Result<u64> {
        let (book_filter, mut values) = book_scope_filter(book_id, "q", 3);
        values.splice(0..0, [start.into(), end.into()]);

        let sql = format!(
            "SELECT COUNT(*) as count FROM queries q WHERE q.created_at >= $1 AND q.created_at < $2 {book_filter}"
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let row = self.read_conn().query_one(stmt).await?;
        Ok(row
            .and_then(|r| r.try_get_by_index::<i64>(0).ok())
            .unwrap_or(0) as u64)
    }

    /// Count of distinct users in `[start, end)`.
    pub async fn count_distinct_users(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        book_id: Option<&str>,
    ) -> Result<u64> {
        let (book_filter, mut values) = book_scope_filter(book_id, "q", 3);
        values.splice(0..0, [start.into(), end.into()]);

        let sql = format!(
            "SELECT COUNT(DISTINCT q.user_id) as count FROM queries q WHERE q.created_at >= $1 AND q.created_at < $2 {book_filter}"
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let row = self.read_conn().query_one(stmt).await?;
        Ok(row
            .and_then(|r| r.try_get_by_index::<i64>(0).ok())
            .unwrap_or(0) as u64)
    }

    /// Latencies (ms) for responses to queries in `[start, end)`, for
    /// percentile computation by the caller.
    pub async fn response_latencies(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        book_id: Option<&str>,
    ) -> Result<Vec<i64>> {
        let (book_filter, mut values) = book_scope_filter(book_id, "q", 3);
        values.splice(0..0, [start.into(), end.into()]);

        let sql = format!(
            r#"
            SELECT r.latency_ms
            FROM query_responses r
            JOIN queries q ON q.id = r.query_id
            WHERE q.created_at >= $1 AND q.created_at < $2 {book_filter}
            ORDER BY r.latency_ms
            "#
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let rows = self.read_conn().query_all(stmt).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.try_get_by_index::<i64>(0).ok())
            .collect())
    }

    /// Average confidence score for responses in `[start, end)`.
    pub async fn average_confidence(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        book_id: Option<&str>,
    ) -> Result<f64> {
        let (book_filter, mut values) = book_scope_filter(book_id, "q", 3);
        values.splice(0..0, [start.into(), end.into()]);

        let sql = format!(
            r#"
            SELECT AVG(r.confidence_score)::float8 as avg_confidence
            FROM query_responses r
            JOIN queries q ON q.id = r.query_id
            WHERE q.created_at >= $1 AND q.created_at < $2 {book_filter}
            "#
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let row = self.read_conn().query_one(stmt).await?;
        Ok(row
            .and_then(|r| r.try_get_by_index::<f64>(0).ok())
            .unwrap_or(0.0))
    }

    /// `(responded, helpful)` feedback counts for responses in `[start, end)`.
    pub async fn feedback_rates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        book_id: Option<&str>,
    ) -> Result<(u64, u64)> {
        let (book_filter, mut values) = book_scope_filter(book_id, "q", 3);
        values.splice(0..0, [start.into(), end.into()]);

        let sql = format!(
            r#"
            SELECT
                COUNT(*) as responded,
                COUNT(*) FILTER (WHERE f.rating = 'helpful') as helpful
            FROM user_feedbacks f
            JOIN query_responses r ON r.id = f.response_id
            JOIN queries q ON q.id = r.query_id
            WHERE q.created_at >= $1 AND q.created_at < $2 {book_filter}
            "#
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let row = self.read_conn().query_one(stmt).await?;
        let Some(row) = row else {
            return Ok((0, 0));
        };
        let responded = row.try_get_by_index::<i64>(0).unwrap_or(0) as u64;
        let helpful = row.try_get_by_index::<i64>(1).unwrap_or(0) as u64;
        Ok((responded, helpful))
    }

    /// Raw query text for queries in `[start, end)`, input to topic
    /// keyword extraction.
    pub async fn query_texts(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        book_id: Option<&str>,
    ) -> Result<Vec<String>> {
        let (book_filter, mut values) = book_scope_filter(book_id, "q", 3);
        values.splice(0..0, [start.into(), end.into()]);

        let sql = format!(
            "SELECT q.query_text FROM queries q WHERE q.created_at >= $1 AND q.created_at < $2 {book_filter}"
        );
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, &sql, values);
        let rows = self.read_conn().query_all(stmt).await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.try_get_by_index::<String>(0).ok())
            .collect())
    }
}

/// Builds an `AND q.book_id = $n` clause plus its bind value when a book
/// scope is given; empty clause and no extra value otherwise.
fn book_scope_filter(
    book_id: Option<&str>,
    alias: &str,
    placeholder: usize,
) -> (String, Vec<sea_orm::Value>) {
    match book_id {
        Some(id) => (
            format!("AND {alias}.book_id = ${placeholder}"),
            vec![id.into()],
        ),
        None => (String::new(), Vec::new()),
    }
}
