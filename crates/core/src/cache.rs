//! Persistent cache of passage vectors, backed by redb.
//!
//! Embedding is the expensive part of a retrieval call, and the same
//! documents are retrieved against over and over. The cache stores each
//! document's passage vectors under a key that changes whenever anything that
//! affects them changes: the content (via its blake3 hash), the passage size,
//! or the encoder.
//!
//! ## Tables
//!
//! - `passage_vectors`: cache key → encoded vector rows
//! - `current_keys`: document id → the one key currently stored for it
//!
//! Storing vectors for a document removes its previous row in the same write
//! transaction, so a document never has more than one row.
//!
//! ## Row format
//!
//! A little-endian `u32` dimension header followed by `rows × dim`
//! little-endian `f32`s.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use crate::document::{Document, DocumentId};
use crate::{Result, SentinelError};

const PASSAGE_VECTORS: TableDefinition<&str, &[u8]> = TableDefinition::new("passage_vectors");
const CURRENT_KEYS: TableDefinition<&str, &str> = TableDefinition::new("current_keys");

/// Identity of one document's passage vectors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub document_id: DocumentId,
    /// Hex blake3 digest of the document content.
    pub content_hash: String,
    pub passage_chars: usize,
    /// [`Embedder::name`](crate::Embedder::name) of the encoder.
    pub embedder: String,
}

impl CacheKey {
    pub fn new(document: &Document, passage_chars: usize, embedder: &str) -> Self {
        Self {
            document_id: document.id.clone(),
            content_hash: blake3::hash(document.content.as_bytes()).to_hex().to_string(),
            passage_chars,
            embedder: embedder.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.document_id, self.content_hash, self.passage_chars, self.embedder
        )
    }
}

type BuildLocks = HashMap<String, Arc<tokio::sync::Mutex<()>>>;

/// redb-backed store of passage vectors, shareable across retrievers.
pub struct PassageVectorCache {
    db: Database,
    build_locks: Mutex<BuildLocks>,
}

impl PassageVectorCache {
    /// Open or create a cache file at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Create a cache that lives only as long as this value.
    pub fn open_in_memory() -> Result<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder().create_with_backend(backend)?;
        Self::init(db)
    }

    fn init(db: Database) -> Result<Self> {
        {
            let write_txn = db.begin_write()?;
            write_txn.open_table(PASSAGE_VECTORS)?;
            write_txn.open_table(CURRENT_KEYS)?;
            write_txn.commit()?;
        }
        Ok(Self {
            db,
            build_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Vectors stored under `key`, if any.
    pub fn get(&self, key: &CacheKey) -> Result<Option<Vec<Vec<f32>>>> {
        let k = key.to_string();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PASSAGE_VECTORS)?;
        let Some(row) = table.get(k.as_str())? else {
            return Ok(None);
        };
        decode_rows(&k, row.value()).map(Some)
    }

    /// Store `vectors` under `key`, replacing whatever the document had before.
    pub fn put(&self, key: &CacheKey, vectors: &[Vec<f32>]) -> Result<()> {
        let bytes = encode_rows(vectors)?;
        let k = key.to_string();
        let doc = key.document_id.as_str();

        let write_txn = self.db.begin_write()?;
        {
            let mut current = write_txn.open_table(CURRENT_KEYS)?;
            let mut rows = write_txn.open_table(PASSAGE_VECTORS)?;
            // Copy the previous key out so the guard is released before insert.
            let previous: Option<String> = current.get(doc)?.map(|g| g.value().to_string());
            if let Some(old) = previous.as_deref().filter(|old| *old != k) {
                rows.remove(old)?;
                debug!(document = doc, "replaced stale passage vectors");
            }
            rows.insert(k.as_str(), bytes.as_slice())?;
            current.insert(doc, k.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Drop everything stored for `document_id`. Returns whether a row existed.
    pub fn remove_document(&self, document_id: &DocumentId) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut current = write_txn.open_table(CURRENT_KEYS)?;
            let mut rows = write_txn.open_table(PASSAGE_VECTORS)?;
            let previous: Option<String> = current
                .remove(document_id.as_str())?
                .map(|g| g.value().to_string());
            match previous {
                Some(old) => {
                    rows.remove(old.as_str())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(existed)
    }

    /// Number of documents with stored vectors.
    pub fn len(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CURRENT_KEYS)?;
        let mut n = 0;
        for entry in table.iter()? {
            entry?;
            n += 1;
        }
        Ok(n)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The async mutex serialising builds of `key`.
    ///
    /// Holders of the same key share one mutex; locks nobody else holds are
    /// pruned on each call.
    pub fn build_lock(&self, key: &CacheKey) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .build_locks
            .lock()
            .map_err(|_| SentinelError::Internal("cache build lock map poisoned".into()))?;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

// ---------------------------------------------------------------------------
// Row encoding
// ---------------------------------------------------------------------------

fn encode_rows(vectors: &[Vec<f32>]) -> Result<Vec<u8>> {
    let dim = vectors.first().map_or(0, Vec::len);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(SentinelError::InvalidEmbedding(format!(
            "cannot cache rows of mixed dimension ({dim} and {})",
            bad.len()
        )));
    }
    let header = u32::try_from(dim)
        .map_err(|_| SentinelError::InvalidEmbedding(format!("dimension {dim} too large")))?;

    let mut bytes = Vec::with_capacity(4 + vectors.len() * dim * 4);
    bytes.extend_from_slice(&header.to_le_bytes());
    for v in vectors {
        bytes.extend(v.iter().flat_map(|x| x.to_le_bytes()));
    }
    Ok(bytes)
}

fn decode_rows(key: &str, bytes: &[u8]) -> Result<Vec<Vec<f32>>> {
    let corrupt = |why: String| SentinelError::Storage(format!("corrupt cache row {key}: {why}"));

    if bytes.len() < 4 {
        return Err(corrupt(format!("{} bytes is shorter than the header", bytes.len())));
    }
    let dim = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[4..];
    if body.len() % 4 != 0 {
        return Err(corrupt(format!(
            "body length {} is not a multiple of 4",
            body.len()
        )));
    }
    let values: Vec<f32> = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if dim == 0 {
        return if values.is_empty() {
            Ok(Vec::new())
        } else {
            Err(corrupt("values present with dimension 0".into()))
        };
    }
    if values.len() % dim != 0 {
        return Err(corrupt(format!(
            "{} values do not divide into rows of {dim}",
            values.len()
        )));
    }
    Ok(values.chunks_exact(dim).map(<[f32]>::to_vec).collect())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
