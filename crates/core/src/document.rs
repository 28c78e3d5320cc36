//! Documents with a validity interval, and the as-of selection contract.
//!
//! A [`Document`] is endpoint documentation that was true for a span of
//! time: `[valid_from, valid_to)`. An incident at time `T` should only ever be
//! diagnosed against documents active at `T`, so selection is by validity,
//! never by "latest".
//!
//! [`DocumentSource`] is the seam to whatever stores documents durably.
//! [`InMemoryDocumentStore`] implements it for tests, demos and embedded use.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{Result, SentinelError};

/// A stable, time-sortable identifier for a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(format!("doc_{}", Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Endpoint documentation valid over a half-open interval of time.
///
/// `valid_from = None` means "since the beginning of time" and
/// `valid_to = None` means "still valid".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    /// Where the text came from (URL, repo path, ticket id, ...).
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub endpoint_id: Option<String>,
}

impl Document {
    /// Create a document with a fresh id, open validity and no endpoint.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: DocumentId::new(),
            title: title.into(),
            content: content.into(),
            source: None,
            created_at: Some(Utc::now()),
            valid_from: None,
            valid_to: None,
            version: None,
            endpoint_id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn for_endpoint(mut self, endpoint_id: impl Into<String>) -> Self {
        self.endpoint_id = Some(endpoint_id.into());
        self
    }

    pub fn valid_from(mut self, at: DateTime<Utc>) -> Self {
        self.valid_from = Some(at);
        self
    }

    pub fn valid_until(mut self, at: DateTime<Utc>) -> Self {
        self.valid_to = Some(at);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Was this document valid at `at`? (`valid_from <= at < valid_to`)
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from.is_none_or(|from| from <= at) && self.valid_to.is_none_or(|to| at < to)
    }

    /// Check the interval invariant `valid_from <= valid_to`.
    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if to < from {
                return Err(SentinelError::MalformedDocument {
                    id: self.id.to_string(),
                    reason: format!("valid_to {to} precedes valid_from {from}"),
                });
            }
        }
        Ok(())
    }
}

/// The as-of selection contract consumed by retrieval.
///
/// Implementations return every document attached to `endpoint_id` whose
/// validity interval covers `at`, most recently created first. An empty
/// `Vec` is the answer when nothing qualifies, not an error.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn select_as_of(&self, endpoint_id: &str, at: DateTime<Utc>) -> Result<Vec<Document>>;
}

/// Process-local document store.
///
/// Linear scans over a `Vec`; intended for the document counts one endpoint
/// carries (tens, not millions).
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<Vec<Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document after checking its validity interval.
    ///
    /// A document whose id is already present is rejected; use [`revise`] to
    /// publish a new version.
    ///
    /// [`revise`]: InMemoryDocumentStore::revise
    pub fn insert(&self, document: Document) -> Result<DocumentId> {
        document.validate()?;
        let mut docs = self.write()?;
        if docs.iter().any(|d| d.id == document.id) {
            return Err(SentinelError::MalformedDocument {
                id: document.id.to_string(),
                reason: "duplicate document id".into(),
            });
        }
        let id = document.id.clone();
        docs.push(document);
        Ok(id)
    }

    pub fn get(&self, id: &DocumentId) -> Result<Document> {
        self.read()?
            .iter()
            .find(|d| &d.id == id)
            .cloned()
            .ok_or_else(|| SentinelError::NotFound(format!("document id {id}")))
    }

    /// Close a document's validity interval at `at`.
    ///
    /// The document is kept: as-of queries before `at` still return it.
    pub fn supersede(&self, id: &DocumentId, at: DateTime<Utc>) -> Result<()> {
        let mut docs = self.write()?;
        let doc = docs
            .iter_mut()
            .find(|d| &d.id == id)
            .ok_or_else(|| SentinelError::NotFound(format!("document id {id}")))?;
        let mut closed = doc.clone();
        closed.valid_to = Some(at);
        closed.validate()?;
        *doc = closed;
        Ok(())
    }

    /// Publish new content for a document while preserving history.
    ///
    /// The old document is superseded at `at` and a successor with the same
    /// title, endpoint and source becomes valid from `at`, carrying
    /// `new_version`. A document that is already superseded cannot be revised
    /// again; revise its successor instead.
    pub fn revise(
        &self,
        id: &DocumentId,
        new_content: impl Into<String>,
        new_version: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<DocumentId> {
        let mut docs = self.write()?;
        let position = docs
            .iter()
            .position(|d| &d.id == id)
            .ok_or_else(|| SentinelError::NotFound(format!("document id {id}")))?;
        let old = &docs[position];
        if old.valid_to.is_some() {
            return Err(SentinelError::MalformedDocument {
                id: id.to_string(),
                reason: "already superseded".into(),
            });
        }

        let mut closed = old.clone();
        closed.valid_to = Some(at);
        closed.validate()?;
        let successor = Document {
            id: DocumentId::new(),
            content: new_content.into(),
            version: new_version,
            created_at: Some(Utc::now()),
            valid_from: Some(at),
            valid_to: None,
            ..old.clone()
        };
        successor.validate()?;

        let successor_id = successor.id.clone();
        docs[position] = closed;
        docs.push(successor);
        Ok(successor_id)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<Document>>> {
        self.docs
            .read()
            .map_err(|_| SentinelError::Internal("document store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Document>>> {
        self.docs
            .write()
            .map_err(|_| SentinelError::Internal("document store lock poisoned".into()))
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocumentStore {
    async fn select_as_of(&self, endpoint_id: &str, at: DateTime<Utc>) -> Result<Vec<Document>> {
        let mut selected: Vec<Document> = self
            .read()?
            .iter()
            .filter(|d| d.endpoint_id.as_deref() == Some(endpoint_id) && d.is_active_at(at))
            .cloned()
            .collect();
        // Newest first; undated documents last. `sort_by` is stable, so equal
        // creation times keep insertion order.
        selected.sort_by(|a, b| match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(selected)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
