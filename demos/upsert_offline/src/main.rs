use std::sync::Arc;

use matchline::auth::{CredentialBundle, InMemoryCredentialResolver};
use matchline::core::{Document, MatchlineError, Retriever};
use matchline::embeddings::FakeEmbeddings;
use matchline::upsert::{
    DocumentInput, InMemoryDocstoreFactory, InMemoryIndexFactory, OutputMode, UpsertAdapter,
    UpsertOutput, UpsertParams,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MatchlineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let credentials = InMemoryCredentialResolver::new().with_credential(
        "gcp-default",
        CredentialBundle::new().with_skip_extra_credential_file(true),
    );
    let adapter = UpsertAdapter::new(
        Arc::new(credentials),
        Arc::new(InMemoryDocstoreFactory::new()),
        Arc::new(InMemoryIndexFactory),
    );

    let documents = vec![
        DocumentInput::Batch(vec![
            Document::new("rust", "Rust is a systems programming language focused on safety."),
            Document::new("python", "Python is a high-level language popular in data science."),
        ]),
        DocumentInput::Single(Document::new(
            "vertex",
            "Vertex AI Matching Engine serves approximate nearest neighbor search.",
        )),
    ];

    let embeddings = Arc::new(FakeEmbeddings::new(16));
    let base = UpsertParams::new(
        embeddings.clone(),
        "gs://demo-bucket/docs",
        "demo-index",
        "demo-endpoint",
    )
    .with_documents(documents)
    .with_credential("gcp-default");

    // --- Retriever output ---
    println!("=== Retriever ===");
    let output = adapter
        .execute(&base.clone().with_top_k("2").with_output(OutputMode::Retriever))
        .await?;
    if let UpsertOutput::Retriever(retriever) = output {
        let docs = retriever.retrieve("nearest neighbor search", 0).await?;
        println!("Retrieved {} docs (k = {})", docs.len(), retriever.k());
        for doc in &docs {
            println!("  {}: \"{}\"", doc.id, doc.content);
        }
    }

    // --- Vector store output ---
    println!("\n=== Vector Store ===");
    let output = adapter
        .execute(&base.with_output(OutputMode::VectorStore))
        .await?;
    if let UpsertOutput::VectorStore(handle) = output {
        let docs = handle.search("safety").await?;
        println!("Found {} docs (k = {:?})", docs.len(), handle.k());
        for doc in &docs {
            println!("  {}: \"{}\"", doc.id, doc.content);
        }
    }

    println!("\nEmbedded {} documents in total", embeddings.embedded_count());
    Ok(())
}
