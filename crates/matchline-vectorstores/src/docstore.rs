use std::collections::HashMap;

use async_trait::async_trait;
use matchline_core::{Docstore, Document, MatchlineError};
use tokio::sync::RwLock;

/// A [`Docstore`] held in process memory.
#[derive(Default)]
pub struct InMemoryDocstore {
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocstore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }
}

#[async_trait]
impl Docstore for InMemoryDocstore {
    async fn add(&self, docs: &[Document]) -> Result<(), MatchlineError> {
        let mut stored = self.docs.write().await;
        for doc in docs {
            stored.insert(doc.id.clone(), doc.clone());
        }
        Ok(())
    }

    async fn search(&self, id: &str) -> Result<Option<Document>, MatchlineError> {
        Ok(self.docs.read().await.get(id).cloned())
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), MatchlineError> {
        let mut stored = self.docs.write().await;
        for id in ids {
            stored.remove(*id);
        }
        Ok(())
    }
}
