//! Incident-facing evidence gathering built on `sentinel-evidence`.
//!
//! An [`Incident`] is a failing API call observed at a point in time. The
//! [`EvidenceDesk`] turns it into a retrieval query, selects the endpoint
//! documentation that was valid when the incident happened, and ranks
//! passages of that documentation as evidence.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sentinel_evidence::{HashEmbedder, HybridRetriever, InMemoryDocumentStore, RetrieverConfig};
//! use sentinel_incident::{EvidenceDesk, Incident};
//!
//! # async fn run() -> sentinel_incident::Result<()> {
//! let store = InMemoryDocumentStore::new();
//! let retriever = HybridRetriever::new(Arc::new(HashEmbedder::default()), RetrieverConfig::default());
//! let desk = EvidenceDesk::new(store, retriever);
//!
//! let incident = Incident::from_json(r#"{
//!     "api": "users", "endpoint": "/v1/users", "method": "GET",
//!     "timestamp": "2024-03-01T12:00:00Z", "logs": "429 Too Many Requests",
//!     "status_code": 429, "latency": 35
//! }"#)?;
//!
//! let evidence = desk.gather(&incident, "ep-users").await?;
//! let context = evidence.assemble_context(4000);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use sentinel_evidence::{
    Document, DocumentId, DocumentSource, FlatVectorIndex, HybridRetriever, RetrievalReport,
    RetrievalResult, VectorIndex,
};

pub use sentinel_evidence::SentinelError as Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Characters of raw log text carried into the retrieval query.
pub const QUERY_LOG_CHARS: usize = 2000;

// ---------------------------------------------------------------------------
// Incident
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A failing API call as reported by monitoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(default)]
    pub id: Option<String>,
    /// API name.
    pub api: String,
    /// Endpoint path, e.g. `/v1/users`.
    pub endpoint: String,
    #[serde(default)]
    pub method: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Raw log text.
    pub logs: String,
    pub status_code: u16,
    /// Milliseconds.
    pub latency: f64,
    #[serde(default)]
    pub severity: Option<Severity>,
}

impl Incident {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The text ranked against documentation passages.
    ///
    /// One line each for the endpoint, status code and latency, then the
    /// first [`QUERY_LOG_CHARS`] characters of the logs.
    pub fn evidence_query(&self) -> String {
        let endpoint = match self.method.as_deref().map(str::trim) {
            Some(method) if !method.is_empty() => {
                format!("endpoint: {method} {}", self.endpoint)
            }
            _ => format!("endpoint: {}", self.endpoint),
        };
        let logs: String = self.logs.chars().take(QUERY_LOG_CHARS).collect();
        [
            endpoint,
            format!("status_code: {}", self.status_code),
            format!("latency_ms: {}", self.latency),
            format!("logs: {logs}"),
        ]
        .join("\n")
    }
}

// ---------------------------------------------------------------------------
// Gathered evidence
// ---------------------------------------------------------------------------

/// Metadata of a document that was valid when the incident happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
    pub version: Option<String>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            version: doc.version.clone(),
            valid_from: doc.valid_from,
            valid_to: doc.valid_to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Doc,
}

/// A citable piece of evidence: a passage and where it sits in its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub id: String,
    pub excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage_end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// What the desk found for one incident.
#[derive(Debug, Clone)]
pub struct IncidentEvidence {
    pub incident_id: Option<String>,
    pub query: String,
    /// Documents valid at the incident timestamp, newest first.
    pub documents: Vec<DocumentSummary>,
    pub retrieval: RetrievalResult,
}

impl IncidentEvidence {
    pub fn report(&self) -> RetrievalReport {
        self.retrieval.report()
    }

    /// Ranked passages as citation records, best first.
    pub fn evidence_items(&self) -> Vec<EvidenceItem> {
        self.report()
            .passages
            .into_iter()
            .map(|p| EvidenceItem {
                kind: EvidenceKind::Doc,
                id: p.document_id.to_string(),
                excerpt: p.text,
                passage_start: Some(p.start_offset),
                passage_end: Some(p.end_offset),
                score: Some(p.score),
            })
            .collect()
    }

    /// A text block of ranked passages holding at most `max_chars` characters.
    ///
    /// One line per passage, best first; a passage that does not fit ends the
    /// block. Line breaks inside a passage are flattened to spaces.
    pub fn assemble_context(&self, max_chars: usize) -> String {
        let mut context = String::new();
        let mut used = 0;

        for p in self.report().passages {
            let title = self
                .documents
                .iter()
                .find(|d| d.id == p.document_id)
                .map_or("", |d| d.title.as_str());
            let text = p.text.split_whitespace().collect::<Vec<_>>().join(" ");
            let line = format!(
                "[{}] {} · {}..{} · {}\n",
                p.document_id, title, p.start_offset, p.end_offset, text
            );
            let len = line.chars().count();
            if used + len > max_chars {
                break;
            }
            context.push_str(&line);
            used += len;
        }

        context
    }
}

// ---------------------------------------------------------------------------
// Desk
// ---------------------------------------------------------------------------

/// Selects documentation as of an incident and ranks it as evidence.
pub struct EvidenceDesk<S, I = FlatVectorIndex> {
    source: S,
    retriever: HybridRetriever<I>,
}

impl<S: DocumentSource, I: VectorIndex + Default> EvidenceDesk<S, I> {
    pub fn new(source: S, retriever: HybridRetriever<I>) -> Self {
        Self { source, retriever }
    }

    /// Gather evidence for `incident` from the documents of `endpoint_id`
    /// that were valid at the incident timestamp.
    pub async fn gather(&self, incident: &Incident, endpoint_id: &str) -> Result<IncidentEvidence> {
        let query = incident.evidence_query();
        let docs = self
            .source
            .select_as_of(endpoint_id, incident.timestamp)
            .await?;
        debug!(
            endpoint = endpoint_id,
            at = %incident.timestamp,
            documents = docs.len(),
            "selected documents"
        );

        let retrieval = self.retriever.retrieve(&query, &docs).await?;
        info!(
            endpoint = endpoint_id,
            passages = retrieval.len(),
            path = ?retrieval.path(),
            "gathered incident evidence"
        );

        Ok(IncidentEvidence {
            incident_id: incident.id.clone(),
            query,
            documents: docs.iter().map(DocumentSummary::from).collect(),
            retrieval,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
