use std::sync::Arc;

use matchline_auth::{resolve_auth_options, CredentialResolver, CredentialSource};
use matchline_core::MatchlineError;
use matchline_vertex::{MatchingEngineArgs, DEFAULT_API_VERSION};

use crate::factory::{
    DocumentStoreFactory, GcsDocstoreFactory, MatchingEngineFactory, VectorIndexClientFactory,
};
use crate::output::{UpsertOutput, VectorStoreHandle};
use crate::params::{normalize_documents, parse_top_k, OutputMode, UpsertParams};

/// Upserts documents into a Matching Engine index and hands back the
/// populated store or a retriever over it.
///
/// The adapter holds no state between calls; every [`execute`] resolves
/// credentials and builds fresh collaborators.
///
/// [`execute`]: UpsertAdapter::execute
pub struct UpsertAdapter {
    credentials: Arc<dyn CredentialResolver>,
    docstores: Arc<dyn DocumentStoreFactory>,
    indexes: Arc<dyn VectorIndexClientFactory>,
}

impl UpsertAdapter {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        docstores: Arc<dyn DocumentStoreFactory>,
        indexes: Arc<dyn VectorIndexClientFactory>,
    ) -> Self {
        Self {
            credentials,
            docstores,
            indexes,
        }
    }

    /// An adapter backed by Cloud Storage and Vertex AI Matching Engine.
    pub fn vertex(credentials: Arc<dyn CredentialResolver>) -> Self {
        Self::new(
            credentials,
            Arc::new(GcsDocstoreFactory::new()),
            Arc::new(MatchingEngineFactory::new()),
        )
    }

    /// Run one upsert.
    ///
    /// Top-K and credentials are validated before anything is written.
    /// Errors from the docstore, the embeddings provider and the index are
    /// returned as raised.
    pub async fn execute(&self, params: &UpsertParams) -> Result<UpsertOutput, MatchlineError> {
        let k = parse_top_k(params.top_k.as_deref())?;

        let bundle = self
            .credentials
            .resolve(&params.credential)
            .await?
            .or_fields_from(&params.credential_inputs);
        let auth = resolve_auth_options(&bundle)?;
        tracing::debug!(
            "upsert: using {} credentials",
            match auth.source() {
                CredentialSource::KeyFile(_) => "key file",
                CredentialSource::Inline(_) => "inline",
                CredentialSource::ApplicationDefault => "application default",
            }
        );

        let documents = normalize_documents(&params.documents);
        let auth = (!auth.is_empty()).then_some(auth);

        let docstore = self
            .docstores
            .create(&params.bucket, auth.as_ref())
            .await?;

        let api_version = params
            .api_version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_API_VERSION);
        let mut args = MatchingEngineArgs::new(&params.index, &params.index_endpoint, docstore)
            .with_api_version(api_version);
        args.auth_options = auth;

        tracing::info!(
            "upsert: adding {} documents to index {}",
            documents.len(),
            params.index
        );
        let store = self
            .indexes
            .from_documents(documents, params.embeddings.clone(), args)
            .await?;

        let handle = VectorStoreHandle::new(store, params.embeddings.clone());
        Ok(match params.output {
            OutputMode::Retriever => UpsertOutput::Retriever(handle.as_retriever(k)),
            OutputMode::VectorStore => UpsertOutput::VectorStore(handle.with_k(k)),
            OutputMode::Default => UpsertOutput::VectorStore(handle),
        })
    }
}
