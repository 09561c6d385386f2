use std::collections::HashMap;

use async_trait::async_trait;
use matchline_core::MatchlineError;

use crate::CredentialBundle;

/// Looks up the credential record behind an opaque handle.
///
/// Hosts keep credentials outside the flow definition and hand adapters
/// only an identifier; implementations turn that identifier back into
/// the stored fields.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, handle: &str) -> Result<CredentialBundle, MatchlineError>;
}

/// Resolver backed by a map of handle → bundle.
///
/// An empty handle resolves to an empty bundle, so a flow without a
/// connected credential fails credential validation rather than lookup.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentialResolver {
    bundles: HashMap<String, CredentialBundle>,
}

impl InMemoryCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(mut self, handle: impl Into<String>, bundle: CredentialBundle) -> Self {
        self.bundles.insert(handle.into(), bundle);
        self
    }

    pub fn insert(&mut self, handle: impl Into<String>, bundle: CredentialBundle) {
        self.bundles.insert(handle.into(), bundle);
    }
}

#[async_trait]
impl CredentialResolver for InMemoryCredentialResolver {
    async fn resolve(&self, handle: &str) -> Result<CredentialBundle, MatchlineError> {
        if handle.is_empty() {
            return Ok(CredentialBundle::default());
        }
        self.bundles
            .get(handle)
            .cloned()
            .ok_or_else(|| MatchlineError::Config(format!("credential not found: {handle}")))
    }
}
