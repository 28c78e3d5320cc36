//! Text → fixed-dimension vector encoders.
//!
//! Retrieval never constructs an encoder itself; callers inject one as an
//! `Arc<dyn Embedder>`, so tests can swap in deterministic or adversarial
//! encoders without touching orchestration.

use async_trait::async_trait;

use crate::Result;

/// A text encoder producing vectors of one fixed dimension.
///
/// Implementations must be pure: the same text and configuration always
/// produce the same vector, and encoding never mutates shared state.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Encode a single text.
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode several texts, returning vectors in input order.
    ///
    /// The default encodes one text at a time. Backends with a native batch
    /// endpoint should override this.
    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        Ok(out)
    }

    /// Dimension of every vector this encoder returns.
    fn dimension(&self) -> usize;

    /// Stable identity of the encoder and its model; part of cache keys.
    fn name(&self) -> &str;
}

/// Default histogram width for [`HashEmbedder`].
pub const DEFAULT_HASH_DIMENSION: usize = 256;

const NORM_FLOOR: f32 = 1e-9;

/// Deterministic character-histogram encoder.
///
/// Each character increments bucket `code_point mod D`; the histogram is then
/// L2-normalised. It carries almost no semantics. It exists so the whole
/// pipeline runs without a model backend, and its only contract is
/// determinism.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    name: String,
}

impl HashEmbedder {
    /// Create an encoder with `dimension` buckets (at least one).
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            name: format!("hash-{dimension}"),
        }
    }

    fn histogram(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dimension];
        for ch in text.chars() {
            vec[ch as usize % self.dimension] += 1.0;
        }
        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt().max(NORM_FLOOR);
        for v in &mut vec {
            *v /= norm;
        }
        vec
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.histogram(text))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.histogram(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(feature = "ollama")]
pub use ollama::OllamaEmbedder;

#[cfg(feature = "ollama")]
mod ollama {
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use tracing::debug;

    use super::Embedder;
    use crate::{Result, SentinelError};

    /// Encoder backed by a local Ollama server's `/api/embed` endpoint.
    pub struct OllamaEmbedder {
        client: reqwest::Client,
        base_url: String,
        model: String,
        dimension: usize,
        name: String,
    }

    #[derive(Serialize)]
    pub(crate) struct EmbedRequest<'a> {
        pub(crate) model: &'a str,
        pub(crate) input: &'a [&'a str],
    }

    #[derive(Deserialize)]
    pub(crate) struct EmbedResponse {
        pub(crate) embeddings: Vec<Vec<f32>>,
    }

    impl OllamaEmbedder {
        pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
            let model = model.into();
            Self {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_string(),
                name: format!("ollama:{model}"),
                model,
                dimension,
            }
        }

        pub(crate) fn check_response(
            &self,
            resp: EmbedResponse,
            expected: usize,
        ) -> Result<Vec<Vec<f32>>> {
            if resp.embeddings.len() != expected {
                return Err(SentinelError::Embedding(format!(
                    "ollama returned {} embeddings for {expected} inputs",
                    resp.embeddings.len()
                )));
            }
            for v in &resp.embeddings {
                if v.len() != self.dimension {
                    return Err(SentinelError::InvalidEmbedding(format!(
                        "model {} returned dimension {}, configured {}",
                        self.model,
                        v.len(),
                        self.dimension
                    )));
                }
            }
            Ok(resp.embeddings)
        }
    }

    #[async_trait]
    impl Embedder for OllamaEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.encode_batch(&[text])
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| SentinelError::Embedding("empty ollama response".into()))
        }

        async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let url = format!("{}/api/embed", self.base_url);
            debug!(model = %self.model, inputs = texts.len(), "requesting embeddings");

            let response = self
                .client
                .post(&url)
                .json(&EmbedRequest {
                    model: &self.model,
                    input: texts,
                })
                .send()
                .await
                .map_err(|e| SentinelError::Embedding(format!("ollama HTTP error: {e}")))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(SentinelError::Embedding(format!(
                    "ollama returned {status}: {body}"
                )));
            }

            let parsed: EmbedResponse = response
                .json()
                .await
                .map_err(|e| SentinelError::Embedding(format!("ollama JSON parse error: {e}")))?;
            self.check_response(parsed, texts.len())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

}
