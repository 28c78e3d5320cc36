//! Retrieval and embedding configuration.
//!
//! Everything can be read from environment-style variables. Loading goes
//! through a lookup function so callers (and tests) can supply values from
//! anywhere; [`RetrieverConfig::from_env`] and [`EmbedderConfig::from_env`]
//! read the process environment.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedding::{Embedder, HashEmbedder, DEFAULT_HASH_DIMENSION};
use crate::{Result, SentinelError};

pub const DEFAULT_MAX_EVIDENCE: usize = 6;
pub const DEFAULT_PASSAGE_CHARS: usize = 1200;
pub const DEFAULT_OLLAMA_HOST: &str = "http://127.0.0.1";
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "nomic-embed-text";

/// Knobs for [`HybridRetriever`](crate::HybridRetriever).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Cap on returned passages, applied after ranking (`MAX_EVIDENCE`).
    pub max_evidence: usize,
    /// Passage size in characters (`PASSAGE_CHARS`).
    pub passage_chars: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_evidence: DEFAULT_MAX_EVIDENCE,
            passage_chars: DEFAULT_PASSAGE_CHARS,
        }
    }
}

impl RetrieverConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            max_evidence: parse_or(&lookup, "MAX_EVIDENCE", DEFAULT_MAX_EVIDENCE)?,
            passage_chars: parse_or(&lookup, "PASSAGE_CHARS", DEFAULT_PASSAGE_CHARS)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_evidence == 0 {
            return Err(SentinelError::Config("MAX_EVIDENCE must be >= 1".into()));
        }
        if self.passage_chars == 0 {
            return Err(SentinelError::Config("PASSAGE_CHARS must be >= 1".into()));
        }
        Ok(())
    }
}

/// Which encoder to build, and its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum EmbedderConfig {
    /// Deterministic character histogram; no model needed.
    Hash { dimension: usize },
    /// A model served by a local Ollama instance.
    Ollama {
        base_url: String,
        model: String,
        dimension: usize,
    },
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        EmbedderConfig::Hash {
            dimension: DEFAULT_HASH_DIMENSION,
        }
    }
}

impl EmbedderConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `SENTINEL_EMBEDDER` (`hash` | `ollama`) and its parameters.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = lookup("SENTINEL_EMBEDDER").unwrap_or_else(|| "hash".to_string());
        let config = match backend.trim().to_ascii_lowercase().as_str() {
            "hash" => EmbedderConfig::Hash {
                dimension: parse_or(&lookup, "EMBEDDING_DIM", DEFAULT_HASH_DIMENSION)?,
            },
            "ollama" => {
                let host =
                    lookup("OLLAMA_HOST").unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string());
                let port: u16 = parse_or(&lookup, "OLLAMA_PORT", DEFAULT_OLLAMA_PORT)?;
                let dimension = parse_or(&lookup, "EMBEDDING_DIM", 0usize)?;
                if dimension == 0 {
                    return Err(SentinelError::Config(
                        "EMBEDDING_DIM is required for the ollama backend".into(),
                    ));
                }
                EmbedderConfig::Ollama {
                    base_url: format!("{}:{port}", host.trim_end_matches('/')),
                    model: lookup("OLLAMA_EMBED_MODEL")
                        .unwrap_or_else(|| DEFAULT_OLLAMA_EMBED_MODEL.to_string()),
                    dimension,
                }
            }
            other => {
                return Err(SentinelError::Config(format!(
                    "unknown SENTINEL_EMBEDDER {other:?} (expected hash or ollama)"
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let dimension = match self {
            EmbedderConfig::Hash { dimension } | EmbedderConfig::Ollama { dimension, .. } => {
                *dimension
            }
        };
        if dimension == 0 {
            return Err(SentinelError::Config("EMBEDDING_DIM must be >= 1".into()));
        }
        Ok(())
    }
}

/// Construct the encoder described by `config`.
pub fn build_embedder(config: &EmbedderConfig) -> Result<Arc<dyn Embedder>> {
    config.validate()?;
    match config {
        EmbedderConfig::Hash { dimension } => Ok(Arc::new(HashEmbedder::new(*dimension))),
        #[cfg(feature = "ollama")]
        EmbedderConfig::Ollama {
            base_url,
            model,
            dimension,
        } => Ok(Arc::new(crate::embedding::OllamaEmbedder::new(
            base_url.clone(),
            model.clone(),
            *dimension,
        ))),
        #[cfg(not(feature = "ollama"))]
        EmbedderConfig::Ollama { .. } => Err(SentinelError::Config(
            "ollama backend is disabled for this build".into(),
        )),
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SentinelError::Config(format!("{key}: cannot parse {raw:?}"))),
    }
}
