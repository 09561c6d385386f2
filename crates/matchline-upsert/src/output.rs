use std::fmt;
use std::sync::Arc;

use matchline_core::{Document, Embeddings, MatchlineError, VectorStore};
use matchline_vectorstores::VectorStoreRetriever;

/// A populated vector store together with the embeddings it was built with.
///
/// `k` is advisory: it records the top-K chosen for the upsert and is used
/// by [`VectorStoreHandle::search`] and [`VectorStoreHandle::retriever`].
#[derive(Clone)]
pub struct VectorStoreHandle {
    store: Arc<dyn VectorStore>,
    embeddings: Arc<dyn Embeddings>,
    k: Option<usize>,
}

impl VectorStoreHandle {
    pub fn new(store: Arc<dyn VectorStore>, embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            store,
            embeddings,
            k: None,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn k(&self) -> Option<usize> {
        self.k
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub fn embeddings(&self) -> &Arc<dyn Embeddings> {
        &self.embeddings
    }

    /// A retriever over the same store returning `k` results per query.
    pub fn as_retriever(&self, k: usize) -> VectorStoreRetriever {
        VectorStoreRetriever::new(self.store.clone(), self.embeddings.clone(), k)
    }

    /// A retriever using the attached `k`, or the default top-K.
    pub fn retriever(&self) -> VectorStoreRetriever {
        self.as_retriever(self.k.unwrap_or(crate::DEFAULT_TOP_K))
    }

    /// Similarity search with the attached `k`, or the default top-K.
    pub async fn search(&self, query: &str) -> Result<Vec<Document>, MatchlineError> {
        let k = self.k.unwrap_or(crate::DEFAULT_TOP_K);
        self.store
            .similarity_search(query, k, self.embeddings.as_ref())
            .await
    }
}

impl fmt::Debug for VectorStoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStoreHandle")
            .field("k", &self.k)
            .finish_non_exhaustive()
    }
}

/// Result of an upsert.
pub enum UpsertOutput {
    Retriever(VectorStoreRetriever),
    VectorStore(VectorStoreHandle),
}

impl UpsertOutput {
    pub fn is_retriever(&self) -> bool {
        matches!(self, Self::Retriever(_))
    }

    pub fn into_retriever(self) -> Option<VectorStoreRetriever> {
        match self {
            Self::Retriever(retriever) => Some(retriever),
            Self::VectorStore(_) => None,
        }
    }

    pub fn into_vector_store(self) -> Option<VectorStoreHandle> {
        match self {
            Self::VectorStore(handle) => Some(handle),
            Self::Retriever(_) => None,
        }
    }
}

impl fmt::Debug for UpsertOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retriever(retriever) => f
                .debug_struct("Retriever")
                .field("k", &retriever.k())
                .finish_non_exhaustive(),
            Self::VectorStore(handle) => f.debug_tuple("VectorStore").field(handle).finish(),
        }
    }
}
