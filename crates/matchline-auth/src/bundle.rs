use std::collections::HashMap;
use std::fmt;

use matchline_core::MatchlineError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Credential fields stored by the host for a Google connection.
///
/// Field names follow the host's credential record. A string field counts
/// as present only when it is non-empty and the skip flag only when it is
/// `true`, so blank form inputs behave like missing ones.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    /// Path to a service-account key file.
    #[serde(
        rename = "googleApplicationCredentialFilePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub key_file_path: Option<String>,
    /// Credential JSON pasted inline.
    #[serde(
        rename = "googleApplicationCredential",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub inline_credential: Option<String>,
    /// Use application-default credentials instead of extra material.
    #[serde(
        rename = "skipExtraCredentialFile",
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub skip_extra_credential_file: Option<bool>,
    #[serde(rename = "projectID", default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl CredentialBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bundle from the raw field map the host stores.
    pub fn from_map(fields: HashMap<String, Value>) -> Result<Self, MatchlineError> {
        let object = fields.into_iter().collect::<serde_json::Map<_, _>>();
        serde_json::from_value(Value::Object(object))
            .map_err(|e| MatchlineError::Config(format!("invalid credential record: {e}")))
    }

    pub fn with_key_file(mut self, path: impl Into<String>) -> Self {
        self.key_file_path = Some(path.into());
        self
    }

    pub fn with_inline_credential(mut self, json: impl Into<String>) -> Self {
        self.inline_credential = Some(json.into());
        self
    }

    pub fn with_skip_extra_credential_file(mut self, skip: bool) -> Self {
        self.skip_extra_credential_file = Some(skip);
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn key_file(&self) -> Option<&str> {
        non_empty(&self.key_file_path)
    }

    pub fn inline_credential(&self) -> Option<&str> {
        non_empty(&self.inline_credential)
    }

    pub fn skips_credential_file(&self) -> bool {
        self.skip_extra_credential_file == Some(true)
    }

    pub fn project(&self) -> Option<&str> {
        non_empty(&self.project_id)
    }

    /// Fill every field this bundle lacks from `fallback`.
    ///
    /// Fields already set here win, even when `fallback` holds a value.
    pub fn or_fields_from(mut self, fallback: &CredentialBundle) -> Self {
        if self.key_file().is_none() && fallback.key_file().is_some() {
            self.key_file_path = fallback.key_file_path.clone();
        }
        if self.inline_credential().is_none() && fallback.inline_credential().is_some() {
            self.inline_credential = fallback.inline_credential.clone();
        }
        if self.skip_extra_credential_file.is_none() {
            self.skip_extra_credential_file = fallback.skip_extra_credential_file;
        }
        if self.project().is_none() && fallback.project().is_some() {
            self.project_id = fallback.project_id.clone();
        }
        self
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("key_file_path", &self.key_file_path)
            .field(
                "inline_credential",
                &self.inline_credential.as_ref().map(|_| "<redacted>"),
            )
            .field("skip_extra_credential_file", &self.skip_extra_credential_file)
            .field("project_id", &self.project_id)
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Accept `true`/`false` as booleans or strings; hosts store form toggles both ways.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => None,
        Some(Flag::Bool(b)) => Some(b),
        Some(Flag::Text(s)) => Some(s.trim().eq_ignore_ascii_case("true")),
    })
}
