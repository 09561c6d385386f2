//! Matchline: upsert documents into Vertex AI Matching Engine.
//!
//! This crate re-exports the Matchline sub-crates for single-import usage.
//! Enable features to control which modules are available.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `default` | `upsert` |
//! | `auth` | Credential bundles, resolvers and Google token providers |
//! | `embeddings` | `FakeEmbeddings` for tests and offline runs |
//! | `gcs` | `GcsDocstore` on Google Cloud Storage |
//! | `vectorstores` | `InMemoryVectorStore`, `InMemoryDocstore`, `VectorStoreRetriever` |
//! | `vertex` | `MatchingEngine` vector store |
//! | `upsert` | `UpsertAdapter` and its collaborator factories |
//! | `full` | All features enabled |
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use matchline::core::{Document, MatchlineError};
//! use matchline::upsert::{OutputMode, UpsertAdapter, UpsertParams};
//! ```

/// Core traits and types: Document, Embeddings, VectorStore, Retriever,
/// Docstore, MatchlineError. Always available.
pub use matchline_core as core;

/// CredentialBundle, CredentialResolver, AuthOptions and token providers.
#[cfg(feature = "auth")]
pub use matchline_auth as auth;

/// Deterministic FakeEmbeddings.
#[cfg(feature = "embeddings")]
pub use matchline_embeddings as embeddings;

/// Document store on Google Cloud Storage.
#[cfg(feature = "gcs")]
pub use matchline_gcs as gcs;

/// In-memory vector store and docstore, VectorStoreRetriever.
#[cfg(feature = "vectorstores")]
pub use matchline_vectorstores as vectorstores;

/// Vertex AI Matching Engine vector store.
#[cfg(feature = "vertex")]
pub use matchline_vertex as vertex;

/// UpsertAdapter, UpsertParams, OutputMode and collaborator factories.
#[cfg(feature = "upsert")]
pub use matchline_upsert as upsert;
