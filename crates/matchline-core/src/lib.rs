//! Core traits and types shared by every Matchline crate.
//!
//! Storage backends, embeddings providers and retrievers all meet at the
//! traits declared here, so integration crates only depend on this one.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for Matchline with variants covering all subsystems.
///
/// `Config` and `Parsing` are raised locally while preparing an upsert.
/// The remaining variants come from collaborators (token endpoints,
/// embeddings providers, the document store, the vector index) and are
/// passed through to the caller as they were raised.
#[derive(Debug, Error)]
pub enum MatchlineError {
    #[error("config error: {0}")]
    Config(String),
    #[error("parsing error: {0}")]
    Parsing(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("embedding error: {0}")]
    Embedding(String),
    #[error("vector store error: {0}")]
    VectorStore(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("retriever error: {0}")]
    Retriever(String),
}

impl MatchlineError {
    /// Whether the error was raised by local configuration checks rather
    /// than by a remote collaborator.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Parsing(_))
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A unit of content with metadata, used throughout the upsert pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: HashMap<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }
}

// ---------------------------------------------------------------------------
// Embeddings trait (implemented in matchline-embeddings or by the host)
// ---------------------------------------------------------------------------

/// Trait for embedding text into vectors.
#[async_trait]
pub trait Embeddings: Send + Sync {
    /// Embed multiple texts (for batch document embedding).
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MatchlineError>;

    /// Embed a single query text.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MatchlineError>;
}

// ---------------------------------------------------------------------------
// Retriever trait (implementations in matchline-vectorstores)
// ---------------------------------------------------------------------------

/// Trait for retrieving relevant documents given a query string.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, MatchlineError>;
}

// ---------------------------------------------------------------------------
// VectorStore trait (implementations in matchline-vectorstores, matchline-vertex)
// ---------------------------------------------------------------------------

/// Trait for vector storage backends.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add documents to the store, computing their embeddings.
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, MatchlineError>;

    /// Search for similar documents by query string.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<Document>, MatchlineError>;

    /// Search with similarity scores (higher = more similar).
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Document, f32)>, MatchlineError>;

    /// Search by pre-computed embedding vector instead of text query.
    async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, MatchlineError>;

    /// Delete documents by ID.
    async fn delete(&self, ids: &[&str]) -> Result<(), MatchlineError>;
}

// ---------------------------------------------------------------------------
// Docstore trait (implementations in matchline-gcs, matchline-vectorstores)
// ---------------------------------------------------------------------------

/// Persistence for raw document content referenced by a vector index.
///
/// Vector indexes only keep ids and vectors; the docstore maps those ids
/// back to full documents.
#[async_trait]
pub trait Docstore: Send + Sync {
    /// Save documents keyed by their `id`, replacing existing entries.
    async fn add(&self, docs: &[Document]) -> Result<(), MatchlineError>;

    /// Look up a document by id.
    async fn search(&self, id: &str) -> Result<Option<Document>, MatchlineError>;

    /// Delete documents by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[&str]) -> Result<(), MatchlineError>;
}
