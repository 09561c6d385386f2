//! Upsert documents into Vertex AI Matching Engine.
//!
//! [`UpsertAdapter`] takes the parameters a flow node collects (documents,
//! an embeddings provider, a bucket, index ids and a credential handle),
//! validates the credential, writes the documents through a
//! [`VectorIndexClientFactory`] and returns either the populated store or
//! a retriever over it.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use matchline_auth::{CredentialBundle, InMemoryCredentialResolver};
//! use matchline_core::Document;
//! use matchline_embeddings::FakeEmbeddings;
//! use matchline_upsert::{OutputMode, UpsertAdapter, UpsertParams};
//!
//! # async fn example() -> Result<(), matchline_core::MatchlineError> {
//! let credentials = InMemoryCredentialResolver::new().with_credential(
//!     "gcp",
//!     CredentialBundle::new().with_skip_extra_credential_file(true),
//! );
//! let adapter = UpsertAdapter::vertex(Arc::new(credentials));
//!
//! let params = UpsertParams::new(
//!     Arc::new(FakeEmbeddings::default()),
//!     "gs://my-bucket/docs",
//!     "projects/p/locations/us-central1/indexes/123",
//!     "projects/p/locations/us-central1/indexEndpoints/456",
//! )
//! .with_document(Document::new("1", "hello"))
//! .with_credential("gcp")
//! .with_top_k("10")
//! .with_output(OutputMode::Retriever);
//!
//! let retriever = adapter.execute(&params).await?.into_retriever();
//! # let _ = retriever;
//! # Ok(())
//! # }
//! ```

mod adapter;
mod factory;
mod output;
mod params;

pub use adapter::UpsertAdapter;
pub use factory::{
    DocumentStoreFactory, GcsDocstoreFactory, InMemoryDocstoreFactory, InMemoryIndexFactory,
    MatchingEngineFactory, VectorIndexClientFactory,
};
pub use output::{UpsertOutput, VectorStoreHandle};
pub use params::{
    normalize_documents, parse_top_k, DocumentInput, OutputMode, UpsertParams, DEFAULT_TOP_K,
};

pub use matchline_auth::{AuthOptions, CredentialBundle, CredentialResolver};
pub use matchline_vectorstores::VectorStoreRetriever;
pub use matchline_vertex::MatchingEngineArgs;
