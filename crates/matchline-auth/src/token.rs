use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use matchline_core::MatchlineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

/// Tokens are refreshed this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// TokenProvider
// ---------------------------------------------------------------------------

/// Source of OAuth2 bearer tokens for Google APIs.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a valid access token, refreshing it when needed.
    async fn access_token(&self) -> Result<String, MatchlineError>;

    /// Project the credentials belong to, if known.
    async fn project_id(&self) -> Result<Option<String>, MatchlineError>;
}

/// Fixed token, for emulators and pre-authorized environments.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
    project_id: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            project_id: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, MatchlineError> {
        Ok(self.token.clone())
    }

    async fn project_id(&self) -> Result<Option<String>, MatchlineError> {
        Ok(self.project_id.clone())
    }
}

/// Wraps a provider and reports a fixed project id.
pub struct ProjectOverride {
    inner: Arc<dyn TokenProvider>,
    project_id: String,
}

impl ProjectOverride {
    pub fn new(inner: Arc<dyn TokenProvider>, project_id: impl Into<String>) -> Self {
        Self {
            inner,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for ProjectOverride {
    async fn access_token(&self) -> Result<String, MatchlineError> {
        self.inner.access_token().await
    }

    async fn project_id(&self) -> Result<Option<String>, MatchlineError> {
        Ok(Some(self.project_id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Token cache
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Default)]
struct TokenCache {
    token: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    async fn get(&self) -> Option<String> {
        let token = self.token.read().await;
        token
            .as_ref()
            .filter(|cached| cached.expires_at > Instant::now() + EXPIRY_MARGIN)
            .map(|cached| cached.access_token.clone())
    }

    async fn store(&self, response: TokenResponse) -> String {
        let mut token = self.token.write().await;
        *token = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });
        response.access_token
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, MatchlineError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| MatchlineError::Auth(format!("failed to read token response: {e}")))?;

    if !status.is_success() {
        return Err(MatchlineError::Auth(format!(
            "token request failed (HTTP {status}): {text}"
        )));
    }

    serde_json::from_str(&text)
        .map_err(|e| MatchlineError::Auth(format!("failed to parse token response: {e}")))
}

// ---------------------------------------------------------------------------
// Credential files
// ---------------------------------------------------------------------------

/// Service-account key as downloaded from the Google Cloud console.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// User credentials produced by `gcloud auth application-default login`.
#[derive(Clone, Deserialize)]
pub struct AuthorizedUserCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default)]
    pub quota_project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// A Google credential JSON document, discriminated by its `type` field.
#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserCredentials),
}

impl CredentialsFile {
    pub fn from_value(value: Value) -> Result<Self, MatchlineError> {
        serde_json::from_value(value)
            .map_err(|e| MatchlineError::Config(format!("unsupported Google credential: {e}")))
    }

    pub async fn from_path(path: &str) -> Result<Self, MatchlineError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            MatchlineError::Config(format!("failed to read credential file {path}: {e}"))
        })?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            MatchlineError::Parsing(format!("credential file {path} is not valid JSON: {e}"))
        })?;
        Self::from_value(value)
    }

    pub fn into_provider(self) -> Arc<dyn TokenProvider> {
        match self {
            Self::ServiceAccount(key) => Arc::new(ServiceAccountTokenProvider::new(key)),
            Self::AuthorizedUser(creds) => Arc::new(AuthorizedUserTokenProvider::new(creds)),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceAccountTokenProvider
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

/// Exchanges a signed JWT assertion for an access token.
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    client: reqwest::Client,
    cache: TokenCache,
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            client: reqwest::Client::new(),
            cache: TokenCache::default(),
        }
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self) -> Result<String, MatchlineError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| MatchlineError::Auth(format!("system clock before epoch: {e}")))?
            .as_secs();

        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        // Keys pasted through forms sometimes carry escaped newlines.
        let pem = self.key.private_key.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            MatchlineError::Auth(format!("invalid service account private key: {e}"))
        })?;

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| MatchlineError::Auth(format!("failed to sign JWT assertion: {e}")))
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn access_token(&self) -> Result<String, MatchlineError> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        tracing::debug!(
            "auth: requesting access token for service account {}",
            self.key.client_email
        );
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| MatchlineError::Auth(format!("token exchange request failed: {e}")))?;

        let token = read_token_response(response).await?;
        Ok(self.cache.store(token).await)
    }

    async fn project_id(&self) -> Result<Option<String>, MatchlineError> {
        Ok(self.key.project_id.clone())
    }
}

// ---------------------------------------------------------------------------
// AuthorizedUserTokenProvider
// ---------------------------------------------------------------------------

/// Refresh-token grant for end-user credentials.
pub struct AuthorizedUserTokenProvider {
    creds: AuthorizedUserCredentials,
    client: reqwest::Client,
    cache: TokenCache,
}

impl AuthorizedUserTokenProvider {
    pub fn new(creds: AuthorizedUserCredentials) -> Self {
        Self {
            creds,
            client: reqwest::Client::new(),
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl TokenProvider for AuthorizedUserTokenProvider {
    async fn access_token(&self) -> Result<String, MatchlineError> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        tracing::debug!("auth: refreshing authorized user token");
        let response = self
            .client
            .post(&self.creds.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
                ("refresh_token", self.creds.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| MatchlineError::Auth(format!("token refresh request failed: {e}")))?;

        let token = read_token_response(response).await?;
        Ok(self.cache.store(token).await)
    }

    async fn project_id(&self) -> Result<Option<String>, MatchlineError> {
        Ok(self.creds.quota_project_id.clone())
    }
}

// ---------------------------------------------------------------------------
// MetadataServerTokenProvider
// ---------------------------------------------------------------------------

/// Tokens from the GCE/GKE/Cloud Run metadata server.
pub struct MetadataServerTokenProvider {
    host: String,
    client: reqwest::Client,
    cache: TokenCache,
}

impl MetadataServerTokenProvider {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            client: reqwest::Client::new(),
            cache: TokenCache::default(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}/computeMetadata/v1/{path}", self.host)
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, MatchlineError> {
        self.client
            .get(self.url(path))
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| MatchlineError::Auth(format!("metadata server request failed: {e}")))
    }
}

impl Default for MetadataServerTokenProvider {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_HOST)
    }
}

#[async_trait]
impl TokenProvider for MetadataServerTokenProvider {
    async fn access_token(&self) -> Result<String, MatchlineError> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        let response = self
            .get("instance/service-accounts/default/token")
            .await?;
        let token = read_token_response(response).await?;
        Ok(self.cache.store(token).await)
    }

    async fn project_id(&self) -> Result<Option<String>, MatchlineError> {
        let response = self.get("project/project-id").await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let project = response
            .text()
            .await
            .map_err(|e| MatchlineError::Auth(format!("failed to read project id: {e}")))?;
        let project = project.trim();
        Ok((!project.is_empty()).then(|| project.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Application default credentials
// ---------------------------------------------------------------------------

/// Resolve application-default credentials.
///
/// Uses the key file named by `GOOGLE_APPLICATION_CREDENTIALS` when set,
/// otherwise the metadata server (host overridable with `GCE_METADATA_HOST`).
pub async fn application_default() -> Result<Arc<dyn TokenProvider>, MatchlineError> {
    if let Some(path) = env_non_empty(CREDENTIALS_ENV) {
        tracing::debug!("auth: application default credentials from {CREDENTIALS_ENV}");
        return Ok(CredentialsFile::from_path(&path).await?.into_provider());
    }

    let host = env_non_empty(METADATA_HOST_ENV).unwrap_or_else(|| DEFAULT_METADATA_HOST.into());
    tracing::debug!("auth: application default credentials from metadata server {host}");
    Ok(Arc::new(MetadataServerTokenProvider::new(host)))
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
