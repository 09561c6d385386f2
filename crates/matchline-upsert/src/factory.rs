use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use matchline_auth::AuthOptions;
use matchline_core::{Docstore, Document, Embeddings, MatchlineError, VectorStore};
use matchline_gcs::{GcsDocstore, GcsDocstoreConfig};
use matchline_vectorstores::{InMemoryDocstore, InMemoryVectorStore};
use matchline_vertex::{MatchingEngine, MatchingEngineArgs};
use tokio::sync::Mutex;

/// Builds the document store for a bucket.
#[async_trait]
pub trait DocumentStoreFactory: Send + Sync {
    /// `auth` is `None` when the caller relies on application-default
    /// credentials.
    async fn create(
        &self,
        bucket: &str,
        auth: Option<&AuthOptions>,
    ) -> Result<Arc<dyn Docstore>, MatchlineError>;
}

/// Builds a vector index client and upserts the documents into it.
#[async_trait]
pub trait VectorIndexClientFactory: Send + Sync {
    async fn from_documents(
        &self,
        docs: Vec<Document>,
        embeddings: Arc<dyn Embeddings>,
        args: MatchingEngineArgs,
    ) -> Result<Arc<dyn VectorStore>, MatchlineError>;
}

// ---------------------------------------------------------------------------
// Google Cloud
// ---------------------------------------------------------------------------

/// [`DocumentStoreFactory`] producing [`GcsDocstore`]s.
#[derive(Debug, Clone, Default)]
pub struct GcsDocstoreFactory {
    endpoint: Option<String>,
}

impl GcsDocstoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send storage requests to another endpoint, e.g. an emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }
}

#[async_trait]
impl DocumentStoreFactory for GcsDocstoreFactory {
    async fn create(
        &self,
        bucket: &str,
        auth: Option<&AuthOptions>,
    ) -> Result<Arc<dyn Docstore>, MatchlineError> {
        let mut config = GcsDocstoreConfig::from_url(bucket)?;
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        let docstore = GcsDocstore::connect(config, auth).await?;
        Ok(Arc::new(docstore))
    }
}

/// [`VectorIndexClientFactory`] producing [`MatchingEngine`] clients.
#[derive(Debug, Clone, Default)]
pub struct MatchingEngineFactory {
    location: Option<String>,
    api_endpoint: Option<String>,
}

impl MatchingEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Region used when the index is given as a bare id.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_api_endpoint(mut self, api_endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(api_endpoint.into());
        self
    }
}

#[async_trait]
impl VectorIndexClientFactory for MatchingEngineFactory {
    async fn from_documents(
        &self,
        docs: Vec<Document>,
        embeddings: Arc<dyn Embeddings>,
        mut args: MatchingEngineArgs,
    ) -> Result<Arc<dyn VectorStore>, MatchlineError> {
        if args.location.is_none() {
            args.location = self.location.clone();
        }
        if args.api_endpoint.is_none() {
            args.api_endpoint = self.api_endpoint.clone();
        }
        let store = MatchingEngine::from_documents(docs, embeddings.as_ref(), args).await?;
        Ok(Arc::new(store))
    }
}

// ---------------------------------------------------------------------------
// In memory
// ---------------------------------------------------------------------------

/// [`DocumentStoreFactory`] keeping one [`InMemoryDocstore`] per bucket.
///
/// The same bucket name yields the same docstore across calls.
#[derive(Default)]
pub struct InMemoryDocstoreFactory {
    buckets: Mutex<HashMap<String, Arc<InMemoryDocstore>>>,
}

impl InMemoryDocstoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The docstore created for `bucket`, if any.
    pub async fn docstore(&self, bucket: &str) -> Option<Arc<InMemoryDocstore>> {
        self.buckets.lock().await.get(bucket).cloned()
    }
}

#[async_trait]
impl DocumentStoreFactory for InMemoryDocstoreFactory {
    async fn create(
        &self,
        bucket: &str,
        _auth: Option<&AuthOptions>,
    ) -> Result<Arc<dyn Docstore>, MatchlineError> {
        if bucket.trim().is_empty() {
            return Err(MatchlineError::Config("bucket name is required".to_string()));
        }
        let mut buckets = self.buckets.lock().await;
        let docstore: Arc<dyn Docstore> = buckets
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemoryDocstore::new()))
            .clone();
        Ok(docstore)
    }
}

/// [`VectorIndexClientFactory`] building an [`InMemoryVectorStore`] that
/// mirrors documents into the docstore from the args.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryIndexFactory;

#[async_trait]
impl VectorIndexClientFactory for InMemoryIndexFactory {
    async fn from_documents(
        &self,
        docs: Vec<Document>,
        embeddings: Arc<dyn Embeddings>,
        args: MatchingEngineArgs,
    ) -> Result<Arc<dyn VectorStore>, MatchlineError> {
        let store = InMemoryVectorStore::new().with_docstore(args.docstore);
        store.add_documents(docs, embeddings.as_ref()).await?;
        Ok(Arc::new(store))
    }
}
