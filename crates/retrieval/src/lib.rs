//! Retrieval library
//!
//! The Vector Index Client wraps pgvector similarity search behind a
//! `Retriever`, and the Citation Builder turns the retrieved chunks into
//! ordered, deduplicated citations with stable URLs.

pub mod citation;
pub mod retriever;
pub mod vector_client;

pub use citation::{Citation, CitationBuilder};
pub use retriever::{RetrievedChunk, Retriever, SourceReference};
pub use vector_client::VectorIndexClient;
