//! Per-call vector index for passage similarity search.
//!
//! [`FlatVectorIndex`] is a flat (brute-force) cosine-similarity index: an
//! arena of passage ids with a parallel list of vectors. Retrieval builds a
//! fresh one for every call and drops it afterwards, so there is no removal,
//! no update and no persistence.
//!
//! # Complexity
//! - `add`: O(p·d) for p passages of dimension d (norms are precomputed)
//! - `search`: O(n·d + n log n)
//!
//! The index stores identity and vectors only. Passage text and offsets live
//! in the retriever's passage table, so any [`VectorIndex`] implementation can
//! be swapped in without touching how evidence is rendered.

use serde::{Deserialize, Serialize};

use crate::document::DocumentId;
use crate::passage::{Passage, PassageId};
use crate::{Result, SentinelError};

/// Cosine similarity in `[-1.0, 1.0]`; only comparable with other `Cosine`s.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cosine(pub f32);

/// One nearest-neighbour hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub document_id: DocumentId,
    pub passage_id: PassageId,
    pub score: Cosine,
}

/// The contract the retriever needs from a similarity index.
pub trait VectorIndex: Send {
    /// Append one entry per passage of `document_id`.
    ///
    /// `vectors[i]` is the embedding of `passages[i]`; the two slices must
    /// have equal length.
    fn add(
        &mut self,
        document_id: &DocumentId,
        vectors: Vec<Vec<f32>>,
        passages: &[Passage],
    ) -> Result<()>;

    /// Top-`k` entries by descending cosine similarity to `query`.
    ///
    /// Ties keep insertion order. Returns fewer than `k` hits when the index
    /// holds fewer entries.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Norms below this are treated as this, so zero vectors score 0.0.
const NORM_FLOOR: f32 = 1e-9;

/// Flat in-memory cosine index.
#[derive(Debug, Default, Clone)]
pub struct FlatVectorIndex {
    ids: Vec<PassageId>,
    vectors: Vec<Vec<f32>>,
    /// Floored L2 norm of each vector, parallel to `vectors`.
    norms: Vec<f32>,
    /// Set on first insert; later inserts and queries are checked against it.
    dim: Option<usize>,
}

impl FlatVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Established vector dimension, `None` while empty.
    pub fn dim(&self) -> Option<usize> {
        self.dim
    }
}

impl VectorIndex for FlatVectorIndex {
    fn add(
        &mut self,
        document_id: &DocumentId,
        vectors: Vec<Vec<f32>>,
        passages: &[Passage],
    ) -> Result<()> {
        if vectors.len() != passages.len() {
            return Err(SentinelError::InvalidEmbedding(format!(
                "document {document_id}: {} vectors for {} passages",
                vectors.len(),
                passages.len()
            )));
        }
        if let Some(stray) = passages.iter().find(|p| &p.id.document_id != document_id) {
            return Err(SentinelError::Internal(format!(
                "passage {} added under document {document_id}",
                stray.id
            )));
        }
        // Validate everything before touching the arena so a bad batch
        // leaves the index unchanged.
        let mut dim = self.dim;
        for v in &vectors {
            check_dim(dim, v.len(), "embedding")?;
            dim = Some(v.len());
        }
        self.dim = dim;

        for (passage, vector) in passages.iter().zip(vectors) {
            self.norms.push(l2_norm(&vector).max(NORM_FLOOR));
            self.ids.push(passage.id.clone());
            self.vectors.push(vector);
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>> {
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }
        check_dim(self.dim, query.len(), "query")?;

        let query_norm = l2_norm(query).max(NORM_FLOOR);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .zip(&self.norms)
            .enumerate()
            .map(|(i, (v, norm))| (i, dot(query, v) / (query_norm * norm)))
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| VectorHit {
                document_id: self.ids[i].document_id.clone(),
                passage_id: self.ids[i].clone(),
                score: Cosine(score),
            })
            .collect())
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}

// ---------------------------------------------------------------------------
// Math helpers
// ---------------------------------------------------------------------------

fn check_dim(expected: Option<usize>, len: usize, what: &str) -> Result<()> {
    if len == 0 {
        return Err(SentinelError::InvalidEmbedding(format!(
            "{what} must not be empty"
        )));
    }
    match expected {
        Some(d) if d != len => Err(SentinelError::InvalidEmbedding(format!(
            "{what} dimension mismatch: index has dim {d}, got {len}"
        ))),
        _ => Ok(()),
    }
}

/// Euclidean (L2) norm of `v`.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
