//! Vertex AI Matching Engine integration for Matchline.
//!
//! [`MatchingEngine`] implements [`VectorStore`] against the Vertex AI REST
//! API. Vectors live in the index; the documents themselves live in a
//! [`Docstore`] so that search results can be turned back into text.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use matchline_auth::AuthOptions;
//! use matchline_gcs::{GcsDocstore, GcsDocstoreConfig};
//! use matchline_vertex::{MatchingEngine, MatchingEngineArgs};
//!
//! # async fn example() -> Result<(), matchline_core::MatchlineError> {
//! let auth = AuthOptions::new().with_key_file("/secrets/sa.json");
//! let docstore = GcsDocstore::connect(GcsDocstoreConfig::new("my-bucket"), Some(&auth)).await?;
//!
//! let args = MatchingEngineArgs::new(
//!     "projects/p/locations/us-central1/indexes/123",
//!     "projects/p/locations/us-central1/indexEndpoints/456",
//!     Arc::new(docstore),
//! )
//! .with_auth_options(auth);
//! let store = MatchingEngine::new(args).await?;
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

mod matching_engine;

pub use matching_engine::{
    resource_name, restricts_from_metadata, MatchingEngine, MatchingEngineArgs, Restrict,
    DEFAULT_API_VERSION, DEFAULT_LOCATION,
};

pub use matchline_core::{Docstore, Document, Embeddings, VectorStore};
