use std::sync::Arc;

use async_trait::async_trait;
use matchline_core::{Document, Embeddings, MatchlineError, Retriever};

use crate::VectorStore;

/// A retriever that wraps a VectorStore, bridging it to the `Retriever` trait.
///
/// The store is shared, not owned: the retriever lives as long as any
/// other handle to the same store.
pub struct VectorStoreRetriever<S: VectorStore + ?Sized = dyn VectorStore> {
    store: Arc<S>,
    embeddings: Arc<dyn Embeddings>,
    k: usize,
    score_threshold: Option<f32>,
}

impl<S: VectorStore + ?Sized + 'static> VectorStoreRetriever<S> {
    pub fn new(store: Arc<S>, embeddings: Arc<dyn Embeddings>, k: usize) -> Self {
        Self {
            store,
            embeddings,
            k,
            score_threshold: None,
        }
    }

    /// Set a minimum similarity score threshold. Only documents with a score
    /// greater than or equal to the threshold will be returned.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Default number of results per query.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Retrieve with the configured `k`.
    pub async fn invoke(&self, query: &str) -> Result<Vec<Document>, MatchlineError> {
        self.retrieve(query, self.k).await
    }
}

#[async_trait]
impl<S: VectorStore + ?Sized + 'static> Retriever for VectorStoreRetriever<S> {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Document>, MatchlineError> {
        let k = if top_k > 0 { top_k } else { self.k };

        if let Some(threshold) = self.score_threshold {
            let scored = self
                .store
                .similarity_search_with_score(query, k, self.embeddings.as_ref())
                .await?;
            Ok(scored
                .into_iter()
                .filter(|(_, score)| *score >= threshold)
                .map(|(doc, _)| doc)
                .collect())
        } else {
            self.store
                .similarity_search(query, k, self.embeddings.as_ref())
                .await
        }
    }
}
