//! Sentinel evidence: temporal-aware hybrid retrieval over endpoint docs.
//!
//! Given an incident tied to a point in time and an endpoint, Sentinel picks
//! the documentation that was valid at that moment, splits it into
//! offset-addressable passages, and ranks those passages against the incident
//! description.
//!
//! Ranking runs on one of two paths:
//!
//! - **Vector path**: passages and the query are embedded with an injected
//!   [`Embedder`] and ranked by cosine similarity in a per-call
//!   [`VectorIndex`].
//! - **Lexical path**: when the vector path yields no hits at all, passages
//!   are ranked with BM25 instead.
//!
//! The two score scales are incompatible, so a [`RetrievalResult`] carries
//! exactly one of them and the types keep them apart.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chrono::Utc;
//! use sentinel_evidence::{
//!     Document, DocumentSource, HashEmbedder, HybridRetriever, InMemoryDocumentStore,
//!     RetrieverConfig,
//! };
//!
//! # async fn run() -> sentinel_evidence::Result<()> {
//! let store = InMemoryDocumentStore::new();
//! store.insert(
//!     Document::new("Users API", "Rate limit: 100 rpm. Retry after 30 seconds.")
//!         .for_endpoint("ep-users")
//!         .valid_from("2024-01-01T00:00:00Z".parse().unwrap()),
//! )?;
//!
//! let docs = store.select_as_of("ep-users", Utc::now()).await?;
//! let retriever = HybridRetriever::new(Arc::new(HashEmbedder::default()), RetrieverConfig::default());
//! let result = retriever.retrieve("429 rate limit exceeded", &docs).await?;
//! for passage in result.report().passages {
//!     println!("{} [{}..{}] {}", passage.document_id, passage.start_offset, passage.end_offset, passage.score);
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "cache")]
pub mod cache;
pub mod chunker;
pub mod config;
pub mod document;
pub mod embedding;
pub mod lexical;
pub mod passage;
pub mod retriever;
pub mod vector;

#[cfg(feature = "cache")]
pub use cache::{CacheKey, PassageVectorCache};
pub use chunker::{chunk, Span, TextWindow};
pub use config::{build_embedder, EmbedderConfig, RetrieverConfig};
pub use document::{Document, DocumentId, DocumentSource, InMemoryDocumentStore};
#[cfg(feature = "ollama")]
pub use embedding::OllamaEmbedder;
pub use embedding::{Embedder, HashEmbedder};
pub use lexical::{Bm25Params, Bm25Score, LexicalHit};
pub use passage::{passages_of, Passage, PassageId};
pub use retriever::{
    EvidencePassage, HybridRetriever, RankingPath, ReportedPassage, RetrievalReport,
    RetrievalResult,
};
pub use vector::{Cosine, FlatVectorIndex, VectorHit, VectorIndex};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SentinelError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),
    #[error("embedding backend error: {0}")]
    Embedding(String),
    #[error("malformed document {id}: {reason}")]
    MalformedDocument { id: String, reason: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "cache")]
impl From<redb::DatabaseError> for SentinelError {
    fn from(e: redb::DatabaseError) -> Self {
        SentinelError::Storage(e.to_string())
    }
}
#[cfg(feature = "cache")]
impl From<redb::TransactionError> for SentinelError {
    fn from(e: redb::TransactionError) -> Self {
        SentinelError::Storage(e.to_string())
    }
}
#[cfg(feature = "cache")]
impl From<redb::TableError> for SentinelError {
    fn from(e: redb::TableError) -> Self {
        SentinelError::Storage(e.to_string())
    }
}
#[cfg(feature = "cache")]
impl From<redb::StorageError> for SentinelError {
    fn from(e: redb::StorageError) -> Self {
        SentinelError::Storage(e.to_string())
    }
}
#[cfg(feature = "cache")]
impl From<redb::CommitError> for SentinelError {
    fn from(e: redb::CommitError) -> Self {
        SentinelError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
