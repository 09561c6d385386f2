use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use matchline_core::{Docstore, Document, Embeddings, MatchlineError};
use tokio::sync::RwLock;

use crate::VectorStore;

/// Stored document with its embedding vector.
struct StoredEntry {
    document: Document,
    embedding: Vec<f32>,
}

/// In-memory vector store using cosine similarity.
///
/// Stands in for a remote index in tests and offline runs. When a
/// docstore is attached, added documents are written to it as well, the
/// way a remote index persists raw content next to its vectors.
pub struct InMemoryVectorStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    docstore: Option<Arc<dyn Docstore>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            docstore: None,
        }
    }

    /// Mirror added and deleted documents into `docstore`.
    pub fn with_docstore(mut self, docstore: Arc<dyn Docstore>) -> Self {
        self.docstore = Some(docstore);
        self
    }

    /// Create a new store pre-populated with documents.
    pub async fn from_documents(
        documents: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Self, MatchlineError> {
        let store = Self::new();
        store.add_documents(documents, embeddings).await?;
        Ok(store)
    }

    /// Number of stored vectors.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn scored(&self, query_vec: &[f32], k: usize) -> Vec<(Document, f32)> {
        let entries = self.entries.read().await;

        let mut scored: Vec<(Document, f32)> = entries
            .values()
            .map(|entry| {
                let score = cosine_similarity(query_vec, &entry.embedding);
                (entry.document.clone(), score)
            })
            .collect();

        // Sort by score descending
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, MatchlineError> {
        let docs: Vec<Document> = docs
            .into_iter()
            .map(|mut doc| {
                if doc.id.is_empty() {
                    doc.id = uuid::Uuid::new_v4().to_string();
                }
                doc
            })
            .collect();

        let texts: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        let vectors = embeddings.embed_documents(&texts).await?;

        if let Some(docstore) = &self.docstore {
            docstore.add(&docs).await?;
        }

        let mut entries = self.entries.write().await;
        let mut ids = Vec::with_capacity(docs.len());

        for (doc, embedding) in docs.into_iter().zip(vectors) {
            ids.push(doc.id.clone());
            entries.insert(
                doc.id.clone(),
                StoredEntry {
                    document: doc,
                    embedding,
                },
            );
        }

        Ok(ids)
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<Document>, MatchlineError> {
        let results = self
            .similarity_search_with_score(query, k, embeddings)
            .await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }

    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<(Document, f32)>, MatchlineError> {
        let query_vec = embeddings.embed_query(query).await?;
        Ok(self.scored(&query_vec, k).await)
    }

    async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, MatchlineError> {
        let scored = self.scored(embedding, k).await;
        Ok(scored.into_iter().map(|(doc, _)| doc).collect())
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), MatchlineError> {
        {
            let mut entries = self.entries.write().await;
            for id in ids {
                entries.remove(*id);
            }
        }
        if let Some(docstore) = &self.docstore {
            docstore.delete(ids).await?;
        }
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
