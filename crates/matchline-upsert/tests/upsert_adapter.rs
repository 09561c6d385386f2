use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use matchline_auth::{AuthOptions, CredentialBundle, InMemoryCredentialResolver};
use matchline_core::{Docstore, Document, Embeddings, MatchlineError, Retriever, VectorStore};
use matchline_embeddings::FakeEmbeddings;
use matchline_upsert::{
    normalize_documents, DocumentInput, DocumentStoreFactory, InMemoryDocstoreFactory,
    InMemoryIndexFactory, MatchingEngineArgs, OutputMode, UpsertAdapter, UpsertOutput,
    UpsertParams, VectorIndexClientFactory,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingDocstores {
    inner: InMemoryDocstoreFactory,
    calls: Mutex<Vec<(String, Option<AuthOptions>)>>,
}

#[async_trait]
impl DocumentStoreFactory for RecordingDocstores {
    async fn create(
        &self,
        bucket: &str,
        auth: Option<&AuthOptions>,
    ) -> Result<Arc<dyn Docstore>, MatchlineError> {
        self.calls
            .lock()
            .unwrap()
            .push((bucket.to_string(), auth.cloned()));
        self.inner.create(bucket, auth).await
    }
}

struct Recorded {
    ids: Vec<String>,
    index: String,
    index_endpoint: String,
    api_version: String,
    auth_options: Option<AuthOptions>,
}

#[derive(Default)]
struct RecordingIndexes {
    calls: Mutex<Vec<Recorded>>,
}

impl RecordingIndexes {
    fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorIndexClientFactory for RecordingIndexes {
    async fn from_documents(
        &self,
        docs: Vec<Document>,
        embeddings: Arc<dyn Embeddings>,
        args: MatchingEngineArgs,
    ) -> Result<Arc<dyn VectorStore>, MatchlineError> {
        self.calls.lock().unwrap().push(Recorded {
            ids: docs.iter().map(|d| d.id.clone()).collect(),
            index: args.index.clone(),
            index_endpoint: args.index_endpoint.clone(),
            api_version: args.api_version.clone(),
            auth_options: args.auth_options.clone(),
        });
        InMemoryIndexFactory.from_documents(docs, embeddings, args).await
    }
}

struct FailingIndexes;

#[async_trait]
impl VectorIndexClientFactory for FailingIndexes {
    async fn from_documents(
        &self,
        _docs: Vec<Document>,
        _embeddings: Arc<dyn Embeddings>,
        _args: MatchingEngineArgs,
    ) -> Result<Arc<dyn VectorStore>, MatchlineError> {
        Err(MatchlineError::VectorStore("index unavailable".to_string()))
    }
}

struct FailingDocstores;

#[async_trait]
impl DocumentStoreFactory for FailingDocstores {
    async fn create(
        &self,
        _bucket: &str,
        _auth: Option<&AuthOptions>,
    ) -> Result<Arc<dyn Docstore>, MatchlineError> {
        Err(MatchlineError::Store("bucket unreachable".to_string()))
    }
}

struct Harness {
    adapter: UpsertAdapter,
    docstores: Arc<RecordingDocstores>,
    indexes: Arc<RecordingIndexes>,
}

fn harness(resolver: InMemoryCredentialResolver) -> Harness {
    let docstores = Arc::new(RecordingDocstores::default());
    let indexes = Arc::new(RecordingIndexes::default());
    let adapter = UpsertAdapter::new(Arc::new(resolver), docstores.clone(), indexes.clone());
    Harness {
        adapter,
        docstores,
        indexes,
    }
}

fn with_bundle(bundle: CredentialBundle) -> Harness {
    harness(InMemoryCredentialResolver::new().with_credential("cred", bundle))
}

fn skip_bundle() -> CredentialBundle {
    CredentialBundle::new().with_skip_extra_credential_file(true)
}

fn params(embeddings: Arc<FakeEmbeddings>) -> UpsertParams {
    UpsertParams::new(embeddings, "gs://docs-bucket/flows", "idx-1", "ep-1")
        .with_credential("cred")
}

fn doc(id: &str) -> Document {
    Document::new(id, format!("content of {id}"))
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_credential_is_config_error_before_side_effects() {
    let h = with_bundle(CredentialBundle::new().with_project_id("p"));
    let err = h
        .adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_document(doc("a")))
        .await
        .unwrap_err();

    match err {
        MatchlineError::Config(msg) => {
            assert_eq!(msg, "Please specify your Google Application Credential")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(h.docstores.calls.lock().unwrap().is_empty());
    assert_eq!(h.indexes.count(), 0);
}

#[tokio::test]
async fn more_than_one_credential_is_config_error() {
    let bundles = [
        CredentialBundle::new()
            .with_key_file("a.json")
            .with_inline_credential("{}"),
        CredentialBundle::new()
            .with_key_file("a.json")
            .with_skip_extra_credential_file(true),
        CredentialBundle::new()
            .with_inline_credential("{}")
            .with_skip_extra_credential_file(true),
    ];
    for bundle in bundles {
        let h = with_bundle(bundle);
        let err = h
            .adapter
            .execute(&params(Arc::new(FakeEmbeddings::default())))
            .await
            .unwrap_err();
        match err {
            MatchlineError::Config(msg) => assert!(msg.starts_with("More than one component")),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.indexes.count(), 0);
    }
}

#[tokio::test]
async fn key_file_reaches_both_collaborators() {
    let h = with_bundle(
        CredentialBundle::new()
            .with_key_file("a.json")
            .with_skip_extra_credential_file(false),
    );
    h.adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())))
        .await
        .unwrap();

    let expected = AuthOptions::new().with_key_file("a.json");
    let docstore_calls = h.docstores.calls.lock().unwrap();
    assert_eq!(docstore_calls[0].0, "gs://docs-bucket/flows");
    assert_eq!(docstore_calls[0].1.as_ref(), Some(&expected));

    let index_calls = h.indexes.calls.lock().unwrap();
    let auth = index_calls[0].auth_options.as_ref().unwrap();
    assert_eq!(auth.key_file.as_deref(), Some("a.json"));
    assert!(auth.credentials.is_none());
}

#[tokio::test]
async fn inline_credential_is_parsed_and_project_attached() {
    let h = with_bundle(
        CredentialBundle::new()
            .with_inline_credential(r#"{"type":"service_account"}"#)
            .with_project_id("proj-7"),
    );
    h.adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())))
        .await
        .unwrap();

    let index_calls = h.indexes.calls.lock().unwrap();
    let auth = index_calls[0].auth_options.as_ref().unwrap();
    assert_eq!(auth.credentials, Some(json!({"type": "service_account"})));
    assert!(auth.key_file.is_none());
    assert_eq!(auth.project_id.as_deref(), Some("proj-7"));
}

#[tokio::test]
async fn malformed_inline_credential_is_parsing_error() {
    let h = with_bundle(CredentialBundle::new().with_inline_credential("{bad json"));
    let err = h
        .adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchlineError::Parsing(_)));
    assert_eq!(h.indexes.count(), 0);
}

#[tokio::test]
async fn skip_flag_falls_back_to_application_default() {
    let h = with_bundle(skip_bundle().with_project_id("ignored"));
    h.adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())))
        .await
        .unwrap();

    assert!(h.docstores.calls.lock().unwrap()[0].1.is_none());
    assert!(h.indexes.calls.lock().unwrap()[0].auth_options.is_none());
}

#[tokio::test]
async fn credential_inputs_fill_missing_fields() {
    let h = harness(InMemoryCredentialResolver::new());
    h.adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_credential("")
                .with_credential_inputs(CredentialBundle::new().with_key_file("node.json")),
        )
        .await
        .unwrap();

    let index_calls = h.indexes.calls.lock().unwrap();
    let auth = index_calls[0].auth_options.as_ref().unwrap();
    assert_eq!(auth.key_file.as_deref(), Some("node.json"));
}

#[tokio::test]
async fn stored_credential_wins_over_inputs() {
    let h = with_bundle(CredentialBundle::new().with_key_file("stored.json"));
    h.adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_credential_inputs(CredentialBundle::new().with_key_file("node.json")),
        )
        .await
        .unwrap();

    let index_calls = h.indexes.calls.lock().unwrap();
    let auth = index_calls[0].auth_options.as_ref().unwrap();
    assert_eq!(auth.key_file.as_deref(), Some("stored.json"));
}

#[tokio::test]
async fn unknown_credential_handle_is_config_error() {
    let h = harness(InMemoryCredentialResolver::new());
    let err = h
        .adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_credential("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchlineError::Config(_)));
}

// ---------------------------------------------------------------------------
// Documents and index binding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn nested_documents_are_flattened_in_order() {
    let h = with_bundle(skip_bundle());
    h.adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_document(vec![doc("d1"), doc("d2")])
                .with_document(doc("d3")),
        )
        .await
        .unwrap();

    let index_calls = h.indexes.calls.lock().unwrap();
    assert_eq!(index_calls[0].ids, vec!["d1", "d2", "d3"]);
}

#[test]
fn normalized_documents_are_fresh_copies() {
    let inputs = vec![
        DocumentInput::Batch(vec![doc("d1"), doc("d2")]),
        DocumentInput::Single(doc("d3")),
    ];
    let normalized = normalize_documents(&inputs);

    let originals: Vec<&Document> = match (&inputs[0], &inputs[1]) {
        (DocumentInput::Batch(batch), DocumentInput::Single(single)) => {
            batch.iter().chain(std::iter::once(single)).collect()
        }
        _ => unreachable!(),
    };
    assert_eq!(normalized.len(), 3);
    for (copy, original) in normalized.iter().zip(originals) {
        assert_eq!(copy, original);
        assert!(!std::ptr::eq(copy, original));
        assert_ne!(copy.content.as_ptr(), original.content.as_ptr());
    }
}

#[test]
fn normalizing_nothing_gives_nothing() {
    assert!(normalize_documents(&[]).is_empty());
    assert!(normalize_documents(&[DocumentInput::Batch(Vec::new())]).is_empty());
}

#[tokio::test]
async fn duplicates_are_kept() {
    let h = with_bundle(skip_bundle());
    h.adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_document(doc("same"))
                .with_document(doc("same")),
        )
        .await
        .unwrap();
    assert_eq!(h.indexes.calls.lock().unwrap()[0].ids, vec!["same", "same"]);
}

#[tokio::test]
async fn index_binding_passes_through_with_default_api_version() {
    let h = with_bundle(skip_bundle());
    h.adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())))
        .await
        .unwrap();
    h.adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_api_version("v1beta1"))
        .await
        .unwrap();

    let index_calls = h.indexes.calls.lock().unwrap();
    assert_eq!(index_calls[0].index, "idx-1");
    assert_eq!(index_calls[0].index_endpoint, "ep-1");
    assert_eq!(index_calls[0].api_version, "v1");
    assert_eq!(index_calls[1].api_version, "v1beta1");
}

#[tokio::test]
async fn documents_land_in_the_bucket_docstore() {
    let docstores = Arc::new(InMemoryDocstoreFactory::new());
    let adapter = UpsertAdapter::new(
        Arc::new(InMemoryCredentialResolver::new().with_credential("cred", skip_bundle())),
        docstores.clone(),
        Arc::new(InMemoryIndexFactory),
    );
    adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_document(doc("d1")))
        .await
        .unwrap();

    let docstore = docstores.docstore("gs://docs-bucket/flows").await.unwrap();
    let stored = docstore.search("d1").await.unwrap().unwrap();
    assert_eq!(stored.content, "content of d1");
}

#[tokio::test]
async fn upserting_twice_writes_twice() {
    let embeddings = Arc::new(FakeEmbeddings::default());
    let h = with_bundle(skip_bundle());
    let request = params(embeddings.clone()).with_document(vec![doc("d1"), doc("d2")]);

    h.adapter.execute(&request).await.unwrap();
    h.adapter.execute(&request).await.unwrap();

    assert_eq!(h.indexes.count(), 2);
    assert_eq!(embeddings.embedded_count(), 4);
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retriever_output_defaults_to_four() {
    let h = with_bundle(skip_bundle());
    let docs: Vec<Document> = (0..6).map(|i| doc(&format!("d{i}"))).collect();
    let output = h
        .adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_document(docs)
                .with_output(OutputMode::Retriever),
        )
        .await
        .unwrap();

    let retriever = output.into_retriever().unwrap();
    assert_eq!(retriever.k(), 4);
    assert_eq!(retriever.retrieve("content", 0).await.unwrap().len(), 4);
}

#[tokio::test]
async fn retriever_output_uses_given_top_k() {
    let h = with_bundle(skip_bundle());
    let output = h
        .adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_top_k("10")
                .with_output("retriever".parse().unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(output.into_retriever().unwrap().k(), 10);
}

#[tokio::test]
async fn vector_store_output_carries_k() {
    let h = with_bundle(skip_bundle());
    let output = h
        .adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_top_k("10")
                .with_output(OutputMode::VectorStore),
        )
        .await
        .unwrap();
    assert!(!output.is_retriever());
    let handle = output.into_vector_store().unwrap();
    assert_eq!(handle.k(), Some(10));
    assert_eq!(handle.retriever().k(), 10);
}

#[tokio::test]
async fn other_output_returns_store_unmodified() {
    let h = with_bundle(skip_bundle());
    let output = h
        .adapter
        .execute(
            &params(Arc::new(FakeEmbeddings::default()))
                .with_document(doc("d1"))
                .with_top_k("10")
                .with_output(OutputMode::from_name("anythingElse")),
        )
        .await
        .unwrap();

    let handle = match output {
        UpsertOutput::VectorStore(handle) => handle,
        UpsertOutput::Retriever(_) => panic!("expected a vector store"),
    };
    assert_eq!(handle.k(), None);
    assert_eq!(handle.retriever().k(), 4);
    let found = handle.search("content of d1").await.unwrap();
    assert_eq!(found[0].id, "d1");
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_top_k_fails_before_credentials() {
    let h = harness(InMemoryCredentialResolver::new());
    let err = h
        .adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_top_k("ten"))
        .await
        .unwrap_err();
    assert!(matches!(err, MatchlineError::Config(ref m) if m.starts_with("Top K")));
    assert!(h.docstores.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn index_errors_propagate_unchanged() {
    let adapter = UpsertAdapter::new(
        Arc::new(InMemoryCredentialResolver::new().with_credential("cred", skip_bundle())),
        Arc::new(InMemoryDocstoreFactory::new()),
        Arc::new(FailingIndexes),
    );
    let err = adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_document(doc("d1")))
        .await
        .unwrap_err();
    match err {
        MatchlineError::VectorStore(msg) => assert_eq!(msg, "index unavailable"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn docstore_errors_propagate_unchanged() {
    let indexes = Arc::new(RecordingIndexes::default());
    let adapter = UpsertAdapter::new(
        Arc::new(InMemoryCredentialResolver::new().with_credential("cred", skip_bundle())),
        Arc::new(FailingDocstores),
        indexes.clone(),
    );
    let err = adapter
        .execute(&params(Arc::new(FakeEmbeddings::default())).with_document(doc("d1")))
        .await
        .unwrap_err();
    match err {
        MatchlineError::Store(msg) => assert_eq!(msg, "bucket unreachable"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(indexes.count(), 0);
}

#[tokio::test]
async fn empty_bucket_is_rejected_before_upsert() {
    let h = with_bundle(skip_bundle());
    let err = h
        .adapter
        .execute(
            &UpsertParams::new(Arc::new(FakeEmbeddings::default()), "", "idx", "ep")
                .with_credential("cred"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MatchlineError::Config(ref m) if m == "bucket name is required"));
    assert_eq!(h.indexes.count(), 0);
}
