use std::fmt;
use std::sync::Arc;

use matchline_core::MatchlineError;
use serde_json::Value;

use crate::token::{application_default, CredentialsFile, ProjectOverride, TokenProvider};
use crate::CredentialBundle;

const MISSING_CREDENTIAL: &str = "Please specify your Google Application Credential";
const AMBIGUOUS_CREDENTIAL: &str = "More than one component has been inputted. Please use only one of the following: Google Application Credential File Path, Google Credential JSON Object, or Skip Extra Credential File.";

/// Resolved authentication material for one invocation.
///
/// At most one of `key_file` and `credentials` is set. When both are
/// absent the Google clients fall back to application-default
/// credentials; see [`AuthOptions::source`].
#[derive(Clone, Default, PartialEq)]
pub struct AuthOptions {
    pub key_file: Option<String>,
    pub credentials: Option<Value>,
    pub project_id: Option<String>,
}

/// Where an access token will come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CredentialSource<'a> {
    KeyFile(&'a str),
    Inline(&'a Value),
    ApplicationDefault,
}

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_file(mut self, path: impl Into<String>) -> Self {
        self.key_file = Some(path.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Value) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// True when no authentication material was attached.
    pub fn is_empty(&self) -> bool {
        self.key_file.is_none() && self.credentials.is_none() && self.project_id.is_none()
    }

    pub fn source(&self) -> CredentialSource<'_> {
        match (&self.key_file, &self.credentials) {
            (Some(path), _) => CredentialSource::KeyFile(path),
            (None, Some(credentials)) => CredentialSource::Inline(credentials),
            (None, None) => CredentialSource::ApplicationDefault,
        }
    }

    /// Build a token provider for the configured credential source.
    ///
    /// Key files are read here, once. The configured `project_id`
    /// overrides whatever project the credential itself names.
    pub async fn token_provider(&self) -> Result<Arc<dyn TokenProvider>, MatchlineError> {
        let provider: Arc<dyn TokenProvider> = match self.source() {
            CredentialSource::KeyFile(path) => {
                tracing::debug!("auth: loading credentials from key file {path}");
                CredentialsFile::from_path(path).await?.into_provider()
            }
            CredentialSource::Inline(value) => {
                tracing::debug!("auth: using inline credentials");
                CredentialsFile::from_value(value.clone())?.into_provider()
            }
            CredentialSource::ApplicationDefault => {
                tracing::debug!("auth: falling back to application default credentials");
                application_default().await?
            }
        };

        Ok(match &self.project_id {
            Some(project_id) => Arc::new(ProjectOverride::new(provider, project_id.clone())),
            None => provider,
        })
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions")
            .field("key_file", &self.key_file)
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Validate a credential bundle and turn it into [`AuthOptions`].
///
/// Exactly one of key-file path, inline credential JSON and the skip flag
/// must be supplied. With the skip flag the result is empty, project id
/// included, and callers use application-default credentials.
pub fn resolve_auth_options(bundle: &CredentialBundle) -> Result<AuthOptions, MatchlineError> {
    let key_file = bundle.key_file();
    let inline = bundle.inline_credential();
    let skip = bundle.skips_credential_file();

    let supplied = [key_file.is_some(), inline.is_some(), skip]
        .into_iter()
        .filter(|present| *present)
        .count();
    if supplied == 0 {
        return Err(MatchlineError::Config(MISSING_CREDENTIAL.to_string()));
    }
    if supplied > 1 {
        return Err(MatchlineError::Config(AMBIGUOUS_CREDENTIAL.to_string()));
    }

    let mut options = AuthOptions::new();
    if skip {
        return Ok(options);
    }

    if let Some(path) = key_file {
        options.key_file = Some(path.to_string());
    } else if let Some(raw) = inline {
        let credentials = serde_json::from_str(raw).map_err(|e| {
            MatchlineError::Parsing(format!("Google Application Credential is not valid JSON: {e}"))
        })?;
        options.credentials = Some(credentials);
    }
    if let Some(project_id) = bundle.project() {
        options.project_id = Some(project_id.to_string());
    }

    Ok(options)
}
