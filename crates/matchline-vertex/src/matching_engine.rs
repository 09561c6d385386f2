use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use matchline_auth::{AuthOptions, TokenProvider};
use matchline_core::{Docstore, Document, Embeddings, MatchlineError, VectorStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;

pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Datapoints sent per `upsertDatapoints` request.
const UPSERT_BATCH_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// MatchingEngineArgs
// ---------------------------------------------------------------------------

/// Everything needed to bind a [`MatchingEngine`] client.
///
/// `index` and `index_endpoint` accept full resource names
/// (`projects/{p}/locations/{l}/indexes/{id}`) or bare ids; bare ids are
/// expanded with the credential's project and the configured location.
#[derive(Clone)]
pub struct MatchingEngineArgs {
    pub index: String,
    pub index_endpoint: String,
    pub api_version: String,
    pub docstore: Arc<dyn Docstore>,
    /// `None` uses application-default credentials.
    pub auth_options: Option<AuthOptions>,
    /// Region; read from `index` when that is a full resource name.
    pub location: Option<String>,
    /// Host (or `scheme://host`) for control-plane calls. Defaults to the
    /// regional `aiplatform.googleapis.com` endpoint.
    pub api_endpoint: Option<String>,
}

impl MatchingEngineArgs {
    pub fn new(
        index: impl Into<String>,
        index_endpoint: impl Into<String>,
        docstore: Arc<dyn Docstore>,
    ) -> Self {
        Self {
            index: index.into(),
            index_endpoint: index_endpoint.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            docstore,
            auth_options: None,
            location: None,
            api_endpoint: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_auth_options(mut self, auth_options: AuthOptions) -> Self {
        self.auth_options = Some(auth_options);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_api_endpoint(mut self, api_endpoint: impl Into<String>) -> Self {
        self.api_endpoint = Some(api_endpoint.into());
        self
    }

    /// Region used for bare ids and the default API host.
    pub fn resolved_location(&self) -> String {
        self.location
            .clone()
            .or_else(|| location_from_resource(&self.index))
            .or_else(|| location_from_resource(&self.index_endpoint))
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
    }

    /// Base URL for control-plane calls, without a trailing slash.
    pub fn api_base(&self) -> String {
        match &self.api_endpoint {
            Some(endpoint) if endpoint.contains("://") => endpoint.trim_end_matches('/').to_string(),
            Some(endpoint) => format!("https://{}", endpoint.trim_end_matches('/')),
            None => format!("https://{}-aiplatform.googleapis.com", self.resolved_location()),
        }
    }
}

impl fmt::Debug for MatchingEngineArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchingEngineArgs")
            .field("index", &self.index)
            .field("index_endpoint", &self.index_endpoint)
            .field("api_version", &self.api_version)
            .field("auth_options", &self.auth_options)
            .field("location", &self.location)
            .field("api_endpoint", &self.api_endpoint)
            .finish_non_exhaustive()
    }
}

/// Read `{l}` out of `projects/{p}/locations/{l}/...`.
fn location_from_resource(name: &str) -> Option<String> {
    let mut parts = name.split('/');
    while let Some(part) = parts.next() {
        if part == "locations" {
            return parts.next().filter(|l| !l.is_empty()).map(str::to_string);
        }
    }
    None
}

/// The service may report the project by number, so deployed indexes are
/// also matched on the trailing id.
fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Expand a bare id into a full resource name; full names pass through.
pub fn resource_name(
    collection: &str,
    id: &str,
    project: Option<&str>,
    location: &str,
) -> Result<String, MatchlineError> {
    let id = id.trim().trim_matches('/');
    if id.starts_with("projects/") {
        return Ok(id.to_string());
    }
    if id.is_empty() {
        return Err(MatchlineError::Config(format!(
            "Matching Engine {collection} id is required"
        )));
    }
    let project = project.ok_or_else(|| {
        MatchlineError::Config(format!(
            "project id is required to expand {collection} id {id}; set projectID or pass a full resource name"
        ))
    })?;
    Ok(format!("projects/{project}/locations/{location}/{collection}/{id}"))
}

/// Turn string metadata into Matching Engine token restricts.
///
/// Each string value (or array of strings) becomes a restrict whose
/// namespace is the metadata key. Other value types are not filterable
/// and are left out.
pub fn restricts_from_metadata(metadata: &HashMap<String, Value>) -> Vec<Restrict> {
    let mut restricts: Vec<Restrict> = metadata
        .iter()
        .filter_map(|(key, value)| {
            let allow_list = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => {
                    let strings: Vec<String> = items
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                    if strings.is_empty() || strings.len() != items.len() {
                        return None;
                    }
                    strings
                }
                _ => return None,
            };
            Some(Restrict {
                namespace: key.clone(),
                allow_list,
            })
        })
        .collect();
    restricts.sort_by(|a, b| a.namespace.cmp(&b.namespace));
    restricts
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Restrict {
    pub namespace: String,
    pub allow_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexDatapoint {
    datapoint_id: String,
    feature_vector: Vec<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    restricts: Vec<Restrict>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexEndpointInfo {
    #[serde(default)]
    public_endpoint_domain_name: Option<String>,
    #[serde(default)]
    deployed_indexes: Vec<DeployedIndex>,
}

#[derive(Debug, Deserialize)]
struct DeployedIndex {
    id: String,
    index: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FindNeighborsResponse {
    #[serde(default)]
    nearest_neighbors: Vec<NearestNeighbors>,
}

#[derive(Debug, Deserialize)]
struct NearestNeighbors {
    #[serde(default)]
    neighbors: Vec<Neighbor>,
}

#[derive(Debug, Deserialize)]
struct Neighbor {
    datapoint: NeighborDatapoint,
    #[serde(default)]
    distance: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NeighborDatapoint {
    datapoint_id: String,
}

/// Where `findNeighbors` calls go, looked up once per client.
#[derive(Debug, Clone)]
struct QueryTarget {
    base: String,
    index_endpoint: String,
    deployed_index_id: String,
}

// ---------------------------------------------------------------------------
// MatchingEngine
// ---------------------------------------------------------------------------

/// A [`VectorStore`] backed by Vertex AI Matching Engine (Vector Search).
///
/// Vectors go to the index through `upsertDatapoints`; document content
/// goes to the attached [`Docstore`] under the same id, because the index
/// only returns datapoint ids from `findNeighbors`.
pub struct MatchingEngine {
    args: MatchingEngineArgs,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    query_target: OnceCell<QueryTarget>,
}

impl MatchingEngine {
    /// Create a client, resolving credentials from `args.auth_options`.
    pub async fn new(args: MatchingEngineArgs) -> Result<Self, MatchlineError> {
        let tokens = args
            .auth_options
            .clone()
            .unwrap_or_default()
            .token_provider()
            .await?;
        Ok(Self::with_token_provider(args, tokens))
    }

    /// Create a client from an existing token provider.
    pub fn with_token_provider(args: MatchingEngineArgs, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            args,
            client: reqwest::Client::new(),
            tokens,
            query_target: OnceCell::new(),
        }
    }

    /// Create a client and upsert `docs` into the index.
    pub async fn from_documents(
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
        args: MatchingEngineArgs,
    ) -> Result<Self, MatchlineError> {
        let store = Self::new(args).await?;
        store.add_documents(docs, embeddings).await?;
        Ok(store)
    }

    pub fn args(&self) -> &MatchingEngineArgs {
        &self.args
    }

    pub fn docstore(&self) -> &Arc<dyn Docstore> {
        &self.args.docstore
    }

    async fn resource(&self, collection: &str, id: &str) -> Result<String, MatchlineError> {
        if id.trim().starts_with("projects/") {
            return resource_name(collection, id, None, "");
        }
        let project = self.tokens.project_id().await?;
        resource_name(
            collection,
            id,
            project.as_deref(),
            &self.args.resolved_location(),
        )
    }

    async fn index_name(&self) -> Result<String, MatchlineError> {
        self.resource("indexes", &self.args.index).await
    }

    async fn index_endpoint_name(&self) -> Result<String, MatchlineError> {
        self.resource("indexEndpoints", &self.args.index_endpoint)
            .await
    }

    fn url(&self, base: &str, resource: &str, method: Option<&str>) -> String {
        let mut url = format!("{base}/{}/{resource}", self.args.api_version);
        if let Some(method) = method {
            url.push(':');
            url.push_str(method);
        }
        url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Value, MatchlineError> {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MatchlineError::VectorStore(format!("Matching Engine request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MatchlineError::VectorStore(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(MatchlineError::VectorStore(format!(
                "Matching Engine API error (HTTP {status}): {text}"
            )));
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|e| {
            MatchlineError::VectorStore(format!("failed to parse Matching Engine response: {e}"))
        })
    }

    async fn post(&self, url: String, body: Value) -> Result<Value, MatchlineError> {
        self.send(self.client.post(url).json(&body)).await
    }

    /// Find the public query domain and deployed index id for our index.
    async fn query_target(&self) -> Result<&QueryTarget, MatchlineError> {
        self.query_target
            .get_or_try_init(|| async {
                let index = self.index_name().await?;
                let endpoint = self.index_endpoint_name().await?;
                let base = self.args.api_base();

                tracing::debug!("matching engine: describing index endpoint {endpoint}");
                let raw = self
                    .send(self.client.get(self.url(&base, &endpoint, None)))
                    .await?;
                let info: IndexEndpointInfo = serde_json::from_value(raw).map_err(|e| {
                    MatchlineError::VectorStore(format!("unexpected index endpoint response: {e}"))
                })?;

                let deployed = info
                    .deployed_indexes
                    .into_iter()
                    .find(|d| d.index == index || last_segment(&d.index) == last_segment(&index))
                    .ok_or_else(|| {
                        MatchlineError::VectorStore(format!(
                            "index {index} is not deployed to endpoint {endpoint}"
                        ))
                    })?;

                let query_base = match info.public_endpoint_domain_name {
                    Some(domain) if !domain.is_empty() => format!("https://{domain}"),
                    _ => base,
                };

                Ok::<_, MatchlineError>(QueryTarget {
                    base: query_base,
                    index_endpoint: endpoint,
                    deployed_index_id: deployed.id,
                })
            })
            .await
    }

    async fn find_neighbors(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(String, f32)>, MatchlineError> {
        let target = self.query_target().await?;
        let body = serde_json::json!({
            "deployedIndexId": target.deployed_index_id,
            "queries": [{
                "datapoint": {
                    "datapointId": "0",
                    "featureVector": embedding,
                },
                "neighborCount": k,
            }],
        });

        let raw = self
            .post(
                self.url(&target.base, &target.index_endpoint, Some("findNeighbors")),
                body,
            )
            .await?;
        let response: FindNeighborsResponse = serde_json::from_value(raw).map_err(|e| {
            MatchlineError::VectorStore(format!("unexpected findNeighbors response: {e}"))
        })?;

        Ok(response
            .nearest_neighbors
            .into_iter()
            .flat_map(|n| n.neighbors)
            .map(|n| (n.datapoint.datapoint_id, n.distance as f32))
            .collect())
    }

    /// Search by vector and return documents with their scores.
    ///
    /// Neighbors whose document is missing from the docstore are skipped.
    async fn similarity_search_by_vector_with_score(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<(Document, f32)>, MatchlineError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbors = self.find_neighbors(embedding, k).await?;
        let mut results = Vec::with_capacity(neighbors.len());
        for (id, score) in neighbors {
            match self.args.docstore.search(&id).await? {
                Some(doc) => results.push((doc, score)),
                None => tracing::warn!("matching engine: no stored document for datapoint {id}"),
            }
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// VectorStore implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl VectorStore for MatchingEngine {
    /// Embed the documents, save them to the docstore, then upsert the
    /// vectors. A failed embedding call leaves the docstore untouched.
    async fn add_documents(
        &self,
        docs: Vec<Document>,
        embeddings: &dyn Embeddings,
    ) -> Result<Vec<String>, MatchlineError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index_name().await?;
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
        if vectors.len() != docs.len() {
            return Err(MatchlineError::Embedding(format!(
                "expected {} embeddings, got {}",
                docs.len(),
                vectors.len()
            )));
        }

        self.args.docstore.add(&docs).await?;

        let datapoints: Vec<IndexDatapoint> = docs
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| IndexDatapoint {
                datapoint_id: doc.id.clone(),
                feature_vector: vector,
                restricts: restricts_from_metadata(&doc.metadata),
            })
            .collect();

        let url = self.url(&self.args.api_base(), &index, Some("upsertDatapoints"));
        tracing::info!(
            "matching engine: upserting {} datapoints into {index}",
            datapoints.len()
        );

        for batch in datapoints.chunks(UPSERT_BATCH_SIZE) {
            self.post(url.clone(), serde_json::json!({ "datapoints": batch }))
                .await?;
        }

        Ok(docs.into_iter().map(|d| d.id).collect())
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
        self.similarity_search_by_vector_with_score(&query_vec, k)
            .await
    }

    async fn similarity_search_by_vector(
        &self,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Document>, MatchlineError> {
        let results = self
            .similarity_search_by_vector_with_score(embedding, k)
            .await?;
        Ok(results.into_iter().map(|(doc, _)| doc).collect())
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), MatchlineError> {
        if ids.is_empty() {
            return Ok(());
        }

        let index = self.index_name().await?;
        let url = self.url(&self.args.api_base(), &index, Some("removeDatapoints"));
        self.post(url, serde_json::json!({ "datapointIds": ids }))
            .await?;

        self.args.docstore.delete(ids).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
