use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use matchline_auth::CredentialBundle;
use matchline_core::{Document, Embeddings, MatchlineError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Results per query when no top-K is given.
pub const DEFAULT_TOP_K: usize = 4;

// ---------------------------------------------------------------------------
// DocumentInput
// ---------------------------------------------------------------------------

/// One element of the document input: a document or a batch of them.
///
/// Hosts pass documents from several upstream loaders as a list whose
/// elements may themselves be lists. Only one level of nesting is allowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentInput {
    Batch(Vec<Document>),
    Single(Document),
}

impl From<Document> for DocumentInput {
    fn from(doc: Document) -> Self {
        Self::Single(doc)
    }
}

impl From<Vec<Document>> for DocumentInput {
    fn from(docs: Vec<Document>) -> Self {
        Self::Batch(docs)
    }
}

/// Flatten the input one level into fresh [`Document`] values.
///
/// Order and duplicates are kept. The caller's documents are never
/// handed to the store.
pub fn normalize_documents(inputs: &[DocumentInput]) -> Vec<Document> {
    inputs
        .iter()
        .flat_map(|input| match input {
            DocumentInput::Single(doc) => std::slice::from_ref(doc),
            DocumentInput::Batch(docs) => docs.as_slice(),
        })
        .map(|doc| Document::with_metadata(doc.id.clone(), doc.content.clone(), doc.metadata.clone()))
        .collect()
}

// ---------------------------------------------------------------------------
// OutputMode
// ---------------------------------------------------------------------------

/// What [`UpsertAdapter::execute`](crate::UpsertAdapter::execute) returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// A retriever configured with the effective top-K.
    Retriever,
    /// The populated store with top-K attached.
    VectorStore,
    /// The populated store as built.
    #[default]
    Default,
}

impl OutputMode {
    /// `"retriever"` and `"vectorStore"` select those modes; anything else
    /// is [`OutputMode::Default`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "retriever" => Self::Retriever,
            "vectorStore" => Self::VectorStore,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retriever => "retriever",
            Self::VectorStore => "vectorStore",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl Serialize for OutputMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OutputMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

// ---------------------------------------------------------------------------
// top-K
// ---------------------------------------------------------------------------

/// Parse the top-K input.
///
/// Unset or blank gives [`DEFAULT_TOP_K`]. Otherwise the value is read as a
/// number and must be a whole number of at least 1, so `"10"` and `"10.0"`
/// both give 10.
pub fn parse_top_k(raw: Option<&str>) -> Result<usize, MatchlineError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(DEFAULT_TOP_K),
        Some(raw) => raw,
    };

    let value: f64 = raw
        .parse()
        .map_err(|_| MatchlineError::Config(format!("Top K must be a number, got {raw:?}")))?;
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 || value > usize::MAX as f64 {
        return Err(MatchlineError::Config(format!(
            "Top K must be a whole number of at least 1, got {raw:?}"
        )));
    }
    Ok(value as usize)
}

// ---------------------------------------------------------------------------
// UpsertParams
// ---------------------------------------------------------------------------

/// Inputs for one upsert.
#[derive(Clone)]
pub struct UpsertParams {
    pub documents: Vec<DocumentInput>,
    pub embeddings: Arc<dyn Embeddings>,
    /// `gs://bucket[/prefix]` or a bare bucket name.
    pub bucket: String,
    pub index: String,
    pub index_endpoint: String,
    /// Defaults to `v1` when unset.
    pub api_version: Option<String>,
    /// Raw top-K input; see [`parse_top_k`].
    pub top_k: Option<String>,
    /// Handle passed to the credential resolver.
    pub credential: String,
    /// Fields used where the resolved credential record has none.
    pub credential_inputs: CredentialBundle,
    pub output: OutputMode,
}

impl UpsertParams {
    pub fn new(
        embeddings: Arc<dyn Embeddings>,
        bucket: impl Into<String>,
        index: impl Into<String>,
        index_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            documents: Vec::new(),
            embeddings,
            bucket: bucket.into(),
            index: index.into(),
            index_endpoint: index_endpoint.into(),
            api_version: None,
            top_k: None,
            credential: String::new(),
            credential_inputs: CredentialBundle::default(),
            output: OutputMode::Default,
        }
    }

    pub fn with_documents(mut self, documents: Vec<DocumentInput>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_document(mut self, document: impl Into<DocumentInput>) -> Self {
        self.documents.push(document.into());
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn with_top_k(mut self, top_k: impl Into<String>) -> Self {
        self.top_k = Some(top_k.into());
        self
    }

    pub fn with_credential(mut self, handle: impl Into<String>) -> Self {
        self.credential = handle.into();
        self
    }

    pub fn with_credential_inputs(mut self, inputs: CredentialBundle) -> Self {
        self.credential_inputs = inputs;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

impl fmt::Debug for UpsertParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpsertParams")
            .field("documents", &self.documents.len())
            .field("bucket", &self.bucket)
            .field("index", &self.index)
            .field("index_endpoint", &self.index_endpoint)
            .field("api_version", &self.api_version)
            .field("top_k", &self.top_k)
            .field("credential", &self.credential)
            .field("credential_inputs", &self.credential_inputs)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}
