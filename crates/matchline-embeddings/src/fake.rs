use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use matchline_core::MatchlineError;

use crate::Embeddings;

/// Deterministic embeddings for tests and offline runs.
///
/// Vectors are derived from the bytes of the input text, so equal texts
/// always embed to equal vectors. Every text passed to
/// [`embed_documents`](Embeddings::embed_documents) is counted, which lets
/// tests observe how many documents were actually embedded.
pub struct FakeEmbeddings {
    dimensions: usize,
    embedded: AtomicUsize,
}

impl FakeEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            embedded: AtomicUsize::new(0),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of document texts embedded so far.
    pub fn embedded_count(&self) -> usize {
        self.embedded.load(Ordering::SeqCst)
    }
}

impl Default for FakeEmbeddings {
    fn default() -> Self {
        Self::new(4)
    }
}

#[async_trait]
impl Embeddings for FakeEmbeddings {
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, MatchlineError> {
        self.embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| text_to_vector(t, self.dimensions))
            .collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, MatchlineError> {
        Ok(text_to_vector(text, self.dimensions))
    }
}

/// Fold the text bytes into `dimensions` buckets and normalize to unit length.
fn text_to_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimensions];
    for (i, byte) in text.bytes().enumerate() {
        vec[i % dimensions] += byte as f32;
    }
    let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut vec {
            *x /= magnitude;
        }
    }
    vec
}
