use std::sync::Arc;

use async_trait::async_trait;
use matchline_core::{Embeddings, MatchlineError};
use matchline_embeddings::FakeEmbeddings;
use matchline_vectorstores::{
    Docstore, Document, InMemoryDocstore, InMemoryVectorStore, Retriever, VectorStore,
    VectorStoreRetriever,
};

#[tokio::test]
async fn add_and_delete_then_search_empty() {
    let store = InMemoryVectorStore::new();
    let embeddings = FakeEmbeddings::default();

    let ids = store
        .add_documents(vec![Document::new("d1", "hello world")], &embeddings)
        .await
        .unwrap();
    assert_eq!(ids, vec!["d1".to_string()]);

    store.delete(&["d1"]).await.unwrap();

    let results = store
        .similarity_search("hello", 5, &embeddings)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn empty_ids_are_generated() {
    let store = InMemoryVectorStore::new();
    let embeddings = FakeEmbeddings::default();

    let ids = store
        .add_documents(
            vec![Document::new("", "first"), Document::new("", "second")],
            &embeddings,
        )
        .await
        .unwrap();

    assert_eq!(ids.len(), 2);
    assert!(ids.iter().all(|id| !id.is_empty()));
    assert_ne!(ids[0], ids[1]);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn similarity_search_returns_at_most_k_results() {
    let embeddings = FakeEmbeddings::default();
    let docs: Vec<Document> = (0..10)
        .map(|i| Document::new(format!("d{i}"), format!("document number {i}")))
        .collect();
    let store = InMemoryVectorStore::from_documents(docs, &embeddings)
        .await
        .unwrap();

    let results = store
        .similarity_search("document", 3, &embeddings)
        .await
        .unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn exact_text_scores_highest() {
    let embeddings = FakeEmbeddings::new(16);
    let store = InMemoryVectorStore::from_documents(
        vec![
            Document::new("a", "vertex matching engine"),
            Document::new("b", "zzzz qqqq"),
        ],
        &embeddings,
    )
    .await
    .unwrap();

    let results = store
        .similarity_search_with_score("vertex matching engine", 2, &embeddings)
        .await
        .unwrap();
    assert_eq!(results[0].0.id, "a");
    assert!((results[0].1 - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn docstore_mirrors_adds_and_deletes() {
    let docstore = Arc::new(InMemoryDocstore::new());
    let store = InMemoryVectorStore::new().with_docstore(docstore.clone());
    let embeddings = FakeEmbeddings::default();

    store
        .add_documents(vec![Document::new("d1", "kept in docstore")], &embeddings)
        .await
        .unwrap();
    let found = docstore.search("d1").await.unwrap().unwrap();
    assert_eq!(found.content, "kept in docstore");

    store.delete(&["d1"]).await.unwrap();
    assert!(docstore.search("d1").await.unwrap().is_none());
}

struct FailingEmbeddings;

#[async_trait]
impl Embeddings for FailingEmbeddings {
    async fn embed_documents(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, MatchlineError> {
        Err(MatchlineError::Embedding("model offline".to_string()))
    }

    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, MatchlineError> {
        Err(MatchlineError::Embedding("model offline".to_string()))
    }
}

#[tokio::test]
async fn embedding_failure_writes_nothing_to_docstore() {
    let docstore = Arc::new(InMemoryDocstore::new());
    let store = InMemoryVectorStore::new().with_docstore(docstore.clone());

    let err = store
        .add_documents(vec![Document::new("d1", "never stored")], &FailingEmbeddings)
        .await
        .unwrap_err();
    assert!(matches!(err, MatchlineError::Embedding(_)));
    assert!(docstore.is_empty().await);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn docstore_delete_ignores_unknown_ids() {
    let docstore = InMemoryDocstore::new();
    docstore.delete(&["nope"]).await.unwrap();
    assert!(docstore.is_empty().await);
}

#[tokio::test]
async fn retriever_over_trait_object_uses_default_k() {
    let embeddings = Arc::new(FakeEmbeddings::default());
    let docs: Vec<Document> = (0..6)
        .map(|i| Document::new(format!("d{i}"), format!("text {i}")))
        .collect();
    let store: Arc<dyn VectorStore> = Arc::new(
        InMemoryVectorStore::from_documents(docs, embeddings.as_ref())
            .await
            .unwrap(),
    );

    let retriever: VectorStoreRetriever = VectorStoreRetriever::new(store, embeddings, 4);
    assert_eq!(retriever.k(), 4);
    assert_eq!(retriever.invoke("text").await.unwrap().len(), 4);
    assert_eq!(retriever.retrieve("text", 0).await.unwrap().len(), 4);
    assert_eq!(retriever.retrieve("text", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn retriever_score_threshold_filters() {
    let embeddings = Arc::new(FakeEmbeddings::new(16));
    let store = Arc::new(
        InMemoryVectorStore::from_documents(
            vec![
                Document::new("a", "exact query text"),
                Document::new("b", "something else entirely"),
            ],
            embeddings.as_ref(),
        )
        .await
        .unwrap(),
    );

    let retriever = VectorStoreRetriever::new(store, embeddings, 2).with_score_threshold(0.9999);
    let results = retriever.retrieve("exact query text", 2).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "a");
}
