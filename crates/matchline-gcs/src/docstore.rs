use std::sync::Arc;

use async_trait::async_trait;
use matchline_auth::{application_default, AuthOptions, TokenProvider};
use matchline_core::{Docstore, Document, MatchlineError};
use reqwest::{StatusCode, Url};

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

// ---------------------------------------------------------------------------
// GcsDocstoreConfig
// ---------------------------------------------------------------------------

/// Location of the documents inside Google Cloud Storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsDocstoreConfig {
    /// Bucket name, without the `gs://` scheme.
    pub bucket: String,
    /// Prepended to every object name (e.g. `docs/`).
    pub prefix: String,
    /// Storage API base URL. Override to target an emulator.
    pub endpoint: String,
}

impl GcsDocstoreConfig {
    /// Create a config for `bucket` with no prefix.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: String::new(),
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
        }
    }

    /// Parse `gs://bucket/prefix`, `gs://bucket` or a bare bucket name.
    ///
    /// A prefix taken from the URL is treated as a folder and always ends
    /// with `/`.
    pub fn from_url(url: &str) -> Result<Self, MatchlineError> {
        let trimmed = url.trim();
        let path = trimmed.strip_prefix("gs://").unwrap_or(trimmed);
        let (bucket, prefix) = match path.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix),
            None => (path, ""),
        };

        if bucket.is_empty() {
            return Err(MatchlineError::Config(format!(
                "document bucket is required, got {url:?}"
            )));
        }

        let prefix = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{prefix}/")
        };
        Ok(Self::new(bucket).with_prefix(prefix))
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Object name a document id is stored under.
    pub fn object_name(&self, id: &str) -> String {
        format!("{}{id}", self.prefix)
    }
}

// ---------------------------------------------------------------------------
// GcsDocstore
// ---------------------------------------------------------------------------

/// A [`Docstore`] backed by the Google Cloud Storage JSON API.
pub struct GcsDocstore {
    config: GcsDocstoreConfig,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl GcsDocstore {
    /// Create a store that authenticates with `auth`, or with
    /// application-default credentials when `auth` is `None` or empty.
    pub async fn connect(
        config: GcsDocstoreConfig,
        auth: Option<&AuthOptions>,
    ) -> Result<Self, MatchlineError> {
        let tokens = match auth {
            Some(options) if !options.is_empty() => options.token_provider().await?,
            _ => application_default().await?,
        };
        Ok(Self::with_token_provider(config, tokens))
    }

    /// Create a store from an existing token provider.
    pub fn with_token_provider(config: GcsDocstoreConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            tokens,
        }
    }

    pub fn config(&self) -> &GcsDocstoreConfig {
        &self.config
    }

    fn base_url(&self) -> Result<Url, MatchlineError> {
        Url::parse(self.config.endpoint.trim_end_matches('/')).map_err(|e| {
            MatchlineError::Config(format!(
                "invalid storage endpoint {}: {e}",
                self.config.endpoint
            ))
        })
    }

    /// `{endpoint}/upload/storage/v1/b/{bucket}/o`
    fn upload_url(&self) -> Result<Url, MatchlineError> {
        self.url_with_segments(&["upload", "storage", "v1", "b", &self.config.bucket, "o"])
    }

    /// `{endpoint}/storage/v1/b/{bucket}/o/{object}` with the object name
    /// encoded as a single path segment.
    fn object_url(&self, id: &str) -> Result<Url, MatchlineError> {
        let object = self.config.object_name(id);
        self.url_with_segments(&["storage", "v1", "b", &self.config.bucket, "o", &object])
    }

    fn url_with_segments(&self, segments: &[&str]) -> Result<Url, MatchlineError> {
        let mut url = self.base_url()?;
        url.path_segments_mut()
            .map_err(|_| {
                MatchlineError::Config(format!(
                    "storage endpoint cannot be a base URL: {}",
                    self.config.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn bearer(&self) -> Result<String, MatchlineError> {
        Ok(format!("Bearer {}", self.tokens.access_token().await?))
    }

    async fn upload(&self, doc: &Document) -> Result<(), MatchlineError> {
        let body = serde_json::to_vec(doc)
            .map_err(|e| MatchlineError::Store(format!("failed to serialize document: {e}")))?;
        let object = self.config.object_name(&doc.id);

        let response = self
            .client
            .post(self.upload_url()?)
            .query(&[("uploadType", "media"), ("name", object.as_str())])
            .header("Authorization", self.bearer().await?)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| MatchlineError::Store(format!("GCS upload request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(MatchlineError::Store(format!(
                "GCS upload of {object} failed (HTTP {status}): {text}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Docstore for GcsDocstore {
    async fn add(&self, docs: &[Document]) -> Result<(), MatchlineError> {
        tracing::debug!(
            "gcs: saving {} documents to gs://{}/{}",
            docs.len(),
            self.config.bucket,
            self.config.prefix
        );
        for doc in docs {
            self.upload(doc).await?;
        }
        Ok(())
    }

    async fn search(&self, id: &str) -> Result<Option<Document>, MatchlineError> {
        let response = self
            .client
            .get(self.object_url(id)?)
            .query(&[("alt", "media")])
            .header("Authorization", self.bearer().await?)
            .send()
            .await
            .map_err(|e| MatchlineError::Store(format!("GCS download request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| MatchlineError::Store(format!("failed to read GCS object: {e}")))?;
        if !status.is_success() {
            return Err(MatchlineError::Store(format!(
                "GCS download of {id} failed (HTTP {status}): {text}"
            )));
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| MatchlineError::Store(format!("failed to parse stored document {id}: {e}")))
    }

    async fn delete(&self, ids: &[&str]) -> Result<(), MatchlineError> {
        for id in ids {
            let response = self
                .client
                .delete(self.object_url(id)?)
                .header("Authorization", self.bearer().await?)
                .send()
                .await
                .map_err(|e| MatchlineError::Store(format!("GCS delete request failed: {e}")))?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                continue;
            }
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(MatchlineError::Store(format!(
                    "GCS delete of {id} failed (HTTP {status}): {text}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
