mod docstore;
mod in_memory;
mod retriever;

pub use docstore::InMemoryDocstore;
pub use in_memory::InMemoryVectorStore;
pub use retriever::VectorStoreRetriever;

// Re-export core traits/types for convenience
pub use matchline_core::{Docstore, Document, Embeddings, Retriever, VectorStore};
