//! Passages: addressable windows of a document's content.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunker::{chunk, Span};
use crate::document::{Document, DocumentId};
use crate::SentinelError;

/// Identity of a passage: its document and its position within it.
///
/// Rendered (and serialised) as `"{document_id}#{ordinal}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PassageId {
    pub document_id: DocumentId,
    pub ordinal: usize,
}

impl PassageId {
    pub fn new(document_id: DocumentId, ordinal: usize) -> Self {
        Self {
            document_id,
            ordinal,
        }
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document_id, self.ordinal)
    }
}

impl From<PassageId> for String {
    fn from(id: PassageId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PassageId {
    type Error = SentinelError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let (doc, ordinal) = s
            .rsplit_once('#')
            .ok_or_else(|| SentinelError::NotFound(format!("passage id without ordinal: {s}")))?;
        let ordinal = ordinal
            .parse()
            .map_err(|_| SentinelError::NotFound(format!("passage id with bad ordinal: {s}")))?;
        Ok(Self::new(DocumentId(doc.to_string()), ordinal))
    }
}

/// An owned passage: identity, text and its character span in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    pub id: PassageId,
    pub text: String,
    pub span: Span,
}

/// Chunk a document into passages of at most `passage_chars` characters.
pub fn passages_of(document: &Document, passage_chars: usize) -> Vec<Passage> {
    chunk(&document.content, passage_chars)
        .into_iter()
        .enumerate()
        .map(|(ordinal, window)| Passage {
            id: PassageId::new(document.id.clone(), ordinal),
            text: window.text.to_string(),
            span: window.span,
        })
        .collect()
}
