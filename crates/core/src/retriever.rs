//! Hybrid retrieval: vector ranking first, BM25 when vectors find nothing.
//!
//! Every call builds its own passage table and vector index from the
//! documents it is handed and drops both when it returns. The passage table
//! is the only source of passage text and offsets; the index contributes
//! identity and ranking.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[cfg(feature = "cache")]
use crate::cache::{CacheKey, PassageVectorCache};
use crate::config::RetrieverConfig;
use crate::document::{Document, DocumentId};
use crate::embedding::Embedder;
use crate::lexical::{self, Bm25Score};
use crate::passage::{passages_of, Passage, PassageId};
use crate::vector::{Cosine, FlatVectorIndex, VectorIndex};
use crate::{Result, SentinelError};

/// Vector search asks for this many candidates per returned passage.
pub const OVER_FETCH: usize = 3;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One ranked passage, with the score type of the path that ranked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePassage<S> {
    pub document_id: DocumentId,
    pub passage_id: PassageId,
    pub text: String,
    /// Character offset of the first character, inclusive.
    pub start_offset: usize,
    /// Character offset one past the last character.
    pub end_offset: usize,
    pub score: S,
}

impl<S> EvidencePassage<S> {
    fn new(passage: &Passage, score: S) -> Self {
        Self {
            document_id: passage.id.document_id.clone(),
            passage_id: passage.id.clone(),
            text: passage.text.clone(),
            start_offset: passage.span.start,
            end_offset: passage.span.end,
            score,
        }
    }
}

/// Which ranking produced a [`RetrievalResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingPath {
    None,
    Vector,
    Lexical,
}

/// Outcome of [`HybridRetriever::retrieve`].
///
/// Cosine and BM25 scores live on different scales, so each variant carries
/// its own score type and the two are never found in one list.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalResult {
    /// No documents were supplied; nothing was ranked.
    NoDocuments,
    /// Ranked by cosine similarity, best first.
    RankedByVector(Vec<EvidencePassage<Cosine>>),
    /// Vector search found nothing; ranked by BM25, best first.
    RankedByLexical(Vec<EvidencePassage<Bm25Score>>),
}

impl RetrievalResult {
    pub fn path(&self) -> RankingPath {
        match self {
            RetrievalResult::NoDocuments => RankingPath::None,
            RetrievalResult::RankedByVector(_) => RankingPath::Vector,
            RetrievalResult::RankedByLexical(_) => RankingPath::Lexical,
        }
    }

    pub fn used_lexical_fallback(&self) -> bool {
        matches!(self, RetrievalResult::RankedByLexical(_))
    }

    pub fn used_vector_path(&self) -> bool {
        matches!(self, RetrievalResult::RankedByVector(_))
    }

    pub fn len(&self) -> usize {
        match self {
            RetrievalResult::NoDocuments => 0,
            RetrievalResult::RankedByVector(p) => p.len(),
            RetrievalResult::RankedByLexical(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into the serialisable wire form.
    pub fn report(&self) -> RetrievalReport {
        let passages = match self {
            RetrievalResult::NoDocuments => Vec::new(),
            RetrievalResult::RankedByVector(p) => p
                .iter()
                .map(|e| ReportedPassage::from_evidence(e, f64::from(e.score.0)))
                .collect(),
            RetrievalResult::RankedByLexical(p) => p
                .iter()
                .map(|e| ReportedPassage::from_evidence(e, e.score.0))
                .collect(),
        };
        RetrievalReport {
            passages,
            used_lexical_fallback: self.used_lexical_fallback(),
            used_vector_path: self.used_vector_path(),
        }
    }
}

/// A passage in a [`RetrievalReport`]. `score` is only comparable with other
/// scores from the same report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedPassage {
    pub document_id: DocumentId,
    pub passage_id: PassageId,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub score: f64,
}

impl ReportedPassage {
    fn from_evidence<S>(e: &EvidencePassage<S>, score: f64) -> Self {
        Self {
            document_id: e.document_id.clone(),
            passage_id: e.passage_id.clone(),
            text: e.text.clone(),
            start_offset: e.start_offset,
            end_offset: e.end_offset,
            score,
        }
    }
}

/// Wire form of a [`RetrievalResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReport {
    pub passages: Vec<ReportedPassage>,
    pub used_lexical_fallback: bool,
    pub used_vector_path: bool,
}

// ---------------------------------------------------------------------------
// Retriever
// ---------------------------------------------------------------------------

/// Ranks passages of a document set against a query.
///
/// `I` is the vector index built for each call.
pub struct HybridRetriever<I = FlatVectorIndex> {
    embedder: Arc<dyn Embedder>,
    config: RetrieverConfig,
    #[cfg(feature = "cache")]
    cache: Option<Arc<PassageVectorCache>>,
    _index: PhantomData<fn() -> I>,
}

impl HybridRetriever<FlatVectorIndex> {
    /// A retriever using the flat cosine index.
    pub fn new(embedder: Arc<dyn Embedder>, config: RetrieverConfig) -> Self {
        Self::with_index(embedder, config)
    }
}

impl<I: VectorIndex + Default> HybridRetriever<I> {
    /// A retriever that builds an `I` for every call.
    pub fn with_index(embedder: Arc<dyn Embedder>, config: RetrieverConfig) -> Self {
        Self {
            embedder,
            config,
            #[cfg(feature = "cache")]
            cache: None,
            _index: PhantomData,
        }
    }

    /// Reuse passage vectors stored in `cache` and store new ones there.
    #[cfg(feature = "cache")]
    pub fn with_cache(mut self, cache: Arc<PassageVectorCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Rank passages of `documents` against `query`.
    ///
    /// At most `max_evidence` passages come back. A config that fails
    /// [`RetrieverConfig::validate`] is a `Config` error. Embedder failures are
    /// returned as errors; the lexical path is taken only when vector search
    /// succeeds with zero hits. Dropping the returned future abandons the call
    /// along with its index.
    pub async fn retrieve(&self, query: &str, documents: &[Document]) -> Result<RetrievalResult> {
        self.config.validate()?;
        if documents.is_empty() {
            debug!("no documents to rank");
            return Ok(RetrievalResult::NoDocuments);
        }
        let documents = admissible(documents);
        if documents.is_empty() {
            return Ok(RetrievalResult::NoDocuments);
        }

        let max_evidence = self.config.max_evidence;
        let mut table: Vec<Passage> = Vec::new();
        let mut lookup: HashMap<PassageId, usize> = HashMap::new();
        let mut index = I::default();

        for doc in &documents {
            let passages = passages_of(doc, self.config.passage_chars);
            if passages.is_empty() {
                continue;
            }
            let vectors = self.passage_vectors(doc, &passages).await?;
            index.add(&doc.id, vectors, &passages)?;
            for passage in passages {
                lookup.insert(passage.id.clone(), table.len());
                table.push(passage);
            }
        }
        debug!(
            documents = documents.len(),
            passages = table.len(),
            indexed = index.len(),
            "built per-call index"
        );

        let query_vector = self.embedder.encode(query).await?;
        let hits = index.search(&query_vector, max_evidence.saturating_mul(OVER_FETCH))?;

        if hits.is_empty() {
            info!(
                passages = table.len(),
                "vector search returned no hits; ranking lexically"
            );
            let texts: Vec<&str> = table.iter().map(|p| p.text.as_str()).collect();
            let ranked = lexical::rank(query, &texts)
                .into_iter()
                .take(max_evidence)
                .map(|hit| EvidencePassage::new(&table[hit.index], hit.score))
                .collect();
            return Ok(RetrievalResult::RankedByLexical(ranked));
        }

        let mut ranked = Vec::with_capacity(max_evidence.min(hits.len()));
        for hit in hits {
            if ranked.len() == max_evidence {
                break;
            }
            match lookup.get(&hit.passage_id) {
                Some(&i) => ranked.push(EvidencePassage::new(&table[i], hit.score)),
                None => warn!(
                    passage = %hit.passage_id,
                    "index returned a passage missing from the passage table; dropping"
                ),
            }
        }
        debug!(returned = ranked.len(), path = ?RankingPath::Vector, "ranked passages");
        Ok(RetrievalResult::RankedByVector(ranked))
    }

    async fn passage_vectors(&self, doc: &Document, passages: &[Passage]) -> Result<Vec<Vec<f32>>> {
        #[cfg(feature = "cache")]
        if let Some(cache) = &self.cache {
            return self.cached_vectors(cache, doc, passages).await;
        }
        #[cfg(not(feature = "cache"))]
        let _ = doc;
        self.embed(passages).await
    }

    #[cfg(feature = "cache")]
    async fn cached_vectors(
        &self,
        cache: &PassageVectorCache,
        doc: &Document,
        passages: &[Passage],
    ) -> Result<Vec<Vec<f32>>> {
        let key = CacheKey::new(doc, self.config.passage_chars, self.embedder.name());
        let lock = cache.build_lock(&key)?;
        let _building = lock.lock().await;

        if let Some(vectors) = cache.get(&key)? {
            if vectors.len() == passages.len() {
                debug!(document = %doc.id, "passage vectors from cache");
                return Ok(vectors);
            }
            warn!(
                document = %doc.id,
                cached = vectors.len(),
                passages = passages.len(),
                "cached row does not match passage count; re-embedding"
            );
        }
        let vectors = self.embed(passages).await?;
        cache.put(&key, &vectors)?;
        Ok(vectors)
    }

    async fn embed(&self, passages: &[Passage]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = passages.iter().map(|p| p.text.as_str()).collect();
        let vectors = self.embedder.encode_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(SentinelError::Embedding(format!(
                "{} returned {} vectors for {} passages",
                self.embedder.name(),
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

/// Documents worth indexing: the first occurrence of each id, if well formed.
fn admissible(documents: &[Document]) -> Vec<&Document> {
    let mut seen: HashSet<&DocumentId> = HashSet::new();
    documents
        .iter()
        .filter(|doc| {
            if !seen.insert(&doc.id) {
                warn!(document = %doc.id, "repeated document id; keeping the first");
                return false;
            }
            if let Err(e) = doc.validate() {
                warn!(document = %doc.id, error = %e, "skipping malformed document");
                return false;
            }
            true
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::vector::VectorHit;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn dt(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn doc(id: &str, content: &str) -> Document {
        Document::new(id, content).with_id(id)
    }

    fn rate_limit_docs() -> Vec<Document> {
        vec![
            doc(
                "A",
                "Rate limit exceeded for endpoint /v1/users. Retry after 30 seconds.",
            ),
            doc("B", "Unrelated deployment notes about database migration."),
        ]
    }

    fn hash_retriever(config: RetrieverConfig) -> HybridRetriever {
        HybridRetriever::new(Arc::new(HashEmbedder::default()), config)
    }

    /// Accepts everything, finds nothing.
    #[derive(Default)]
    struct NoHitsIndex {
        added: usize,
    }

    impl VectorIndex for NoHitsIndex {
        fn add(&mut self, _: &DocumentId, vectors: Vec<Vec<f32>>, _: &[Passage]) -> Result<()> {
            self.added += vectors.len();
            Ok(())
        }
        fn search(&self, _: &[f32], _: usize) -> Result<Vec<VectorHit>> {
            Ok(Vec::new())
        }
        fn len(&self) -> usize {
            self.added
        }
    }

    /// Returns one hit nobody indexed, ahead of the real ones.
    #[derive(Default)]
    struct StrayHitIndex {
        inner: FlatVectorIndex,
    }

    impl VectorIndex for StrayHitIndex {
        fn add(&mut self, d: &DocumentId, v: Vec<Vec<f32>>, p: &[Passage]) -> Result<()> {
            self.inner.add(d, v, p)
        }
        fn search(&self, q: &[f32], k: usize) -> Result<Vec<VectorHit>> {
            let ghost = DocumentId::from("ghost");
            let mut hits = vec![VectorHit {
                document_id: ghost.clone(),
                passage_id: PassageId::new(ghost, 0),
                score: Cosine(1.0),
            }];
            hits.extend(self.inner.search(q, k)?);
            Ok(hits)
        }
        fn len(&self) -> usize {
            self.inner.len()
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn encode(&self, _: &str) -> Result<Vec<f32>> {
            Err(SentinelError::Embedding("backend down".into()))
        }
        fn dimension(&self) -> usize {
            8
        }
        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowEmbedder {
        inner: HashEmbedder,
        delay: Duration,
    }

    #[async_trait]
    impl Embedder for SlowEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            tokio::time::sleep(self.delay).await;
            self.inner.encode(text).await
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    /// Counts batch calls; delegates to the hash encoder.
    #[derive(Default)]
    struct CountingEmbedder {
        inner: HashEmbedder,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn encode(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.encode(text).await
        }
        async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.inner.encode_batch(texts).await
        }
        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
        fn name(&self) -> &str {
            self.inner.name()
        }
    }

    // ------------------------------------------------------------------
    // Empty input
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn no_documents_means_no_passages_and_no_flags() {
        let result = hash_retriever(RetrieverConfig::default())
            .retrieve("anything", &[])
            .await
            .unwrap();
        assert_eq!(result, RetrievalResult::NoDocuments);
        let report = result.report();
        assert!(report.passages.is_empty());
        assert!(!report.used_lexical_fallback);
        assert!(!report.used_vector_path);
    }

    #[tokio::test]
    async fn only_malformed_documents_is_no_documents() {
        let bad = doc("bad", "text")
            .valid_from(dt("2024-06-01T00:00:00Z"))
            .valid_until(dt("2024-01-01T00:00:00Z"));
        let result = hash_retriever(RetrieverConfig::default())
            .retrieve("text", &[bad])
            .await
            .unwrap();
        assert_eq!(result.path(), RankingPath::None);
    }

    // ------------------------------------------------------------------
    // Lexical path
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn lexical_fallback_ranks_relevant_document_first() {
        let retriever: HybridRetriever<NoHitsIndex> =
            HybridRetriever::with_index(Arc::new(HashEmbedder::default()), RetrieverConfig::default());
        let result = retriever
            .retrieve("rate limit exceeded /v1/users", &rate_limit_docs())
            .await
            .unwrap();

        assert!(result.used_lexical_fallback());
        assert!(!result.used_vector_path());
        let RetrievalResult::RankedByLexical(passages) = result else {
            panic!("expected lexical ranking");
        };
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].document_id, DocumentId::from("A"));
        assert!(passages[0].score > passages[1].score);
        assert!(passages.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn lexical_fallback_cap_keeps_the_top_passages() {
        let docs = vec![
            doc("A", "rate limit exceeded, rate limit applies per key"),
            doc("B", "rate limit is 100 requests per minute"),
            doc("C", "limit on payload size"),
            doc("D", "retry after the limit resets"),
            doc("E", "unrelated deployment notes"),
        ];
        let lexical = |max_evidence| {
            HybridRetriever::<NoHitsIndex>::with_index(
                Arc::new(HashEmbedder::default()),
                RetrieverConfig {
                    max_evidence,
                    ..RetrieverConfig::default()
                },
            )
        };
        let all = lexical(100).retrieve("rate limit", &docs).await.unwrap();
        let capped = lexical(2).retrieve("rate limit", &docs).await.unwrap();

        let (RetrievalResult::RankedByLexical(all), RetrievalResult::RankedByLexical(capped)) =
            (all, capped)
        else {
            panic!("expected lexical ranking");
        };
        assert_eq!(all.len(), docs.len());
        assert_eq!(capped.len(), 2);
        assert_eq!(capped, all[..2].to_vec());
        assert_eq!(capped[0].document_id, DocumentId::from("A"));
    }

    #[tokio::test]
    async fn zero_max_evidence_is_a_config_error() {
        let err = hash_retriever(RetrieverConfig {
            max_evidence: 0,
            ..RetrieverConfig::default()
        })
        .retrieve("rate limit", &rate_limit_docs())
        .await
        .unwrap_err();
        assert!(matches!(err, SentinelError::Config(_)));
    }

    #[tokio::test]
    async fn documents_without_content_fall_back_to_empty_lexical() {
        let result = hash_retriever(RetrieverConfig::default())
            .retrieve("query", &[doc("empty", "")])
            .await
            .unwrap();
        assert!(result.used_lexical_fallback());
        assert!(result.is_empty());
    }

    // ------------------------------------------------------------------
    // Vector path
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn vector_path_sets_only_the_vector_flag() {
        let docs = rate_limit_docs();
        let result = hash_retriever(RetrieverConfig::default())
            .retrieve(&docs[0].content, &docs)
            .await
            .unwrap();
        assert!(result.used_vector_path());
        assert!(!result.used_lexical_fallback());

        let RetrievalResult::RankedByVector(passages) = result else {
            panic!("expected vector ranking");
        };
        // The query is A's content verbatim, so A scores a perfect match.
        assert_eq!(passages[0].document_id, DocumentId::from("A"));
        assert!((passages[0].score.0 - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn cap_keeps_the_top_passages() {
        let docs: Vec<Document> = [
            "timeout calling upstream",
            "rate limit exceeded",
            "database migration notes",
            "retry after 30 seconds",
            "GET /v1/users returns 200",
            "latency budget is 250 ms",
            "circuit breaker opened",
            "schema changed in v2",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| doc(&format!("d{i}"), text))
        .collect();
        let all = hash_retriever(RetrieverConfig {
            max_evidence: 100,
            ..RetrieverConfig::default()
        })
        .retrieve("rate limit retry", &docs)
        .await
        .unwrap();
        let capped = hash_retriever(RetrieverConfig {
            max_evidence: 3,
            ..RetrieverConfig::default()
        })
        .retrieve("rate limit retry", &docs)
        .await
        .unwrap();

        let (RetrievalResult::RankedByVector(all), RetrievalResult::RankedByVector(capped)) =
            (all, capped)
        else {
            panic!("expected vector ranking");
        };
        assert_eq!(capped.len(), 3);
        assert_eq!(capped, all[..3].to_vec());
    }

    #[tokio::test]
    async fn offsets_come_from_the_passage_table() {
        let content = "0123456789abcdefghij";
        let result = hash_retriever(RetrieverConfig {
            max_evidence: 10,
            passage_chars: 8,
        })
        .retrieve("abc", &[doc("d", content)])
        .await
        .unwrap();
        let report = result.report();
        assert_eq!(report.passages.len(), 3);
        for p in &report.passages {
            let slice: String = content
                .chars()
                .skip(p.start_offset)
                .take(p.end_offset - p.start_offset)
                .collect();
            assert_eq!(p.text, slice);
        }
    }

    #[tokio::test]
    async fn unknown_hits_are_dropped() {
        let retriever: HybridRetriever<StrayHitIndex> =
            HybridRetriever::with_index(Arc::new(HashEmbedder::default()), RetrieverConfig::default());
        let result = retriever
            .retrieve("rate limit", &rate_limit_docs())
            .await
            .unwrap();
        let RetrievalResult::RankedByVector(passages) = result else {
            panic!("expected vector ranking");
        };
        assert_eq!(passages.len(), 2);
        assert!(passages
            .iter()
            .all(|p| p.document_id != DocumentId::from("ghost")));
    }

    #[tokio::test]
    async fn repeated_ids_keep_the_first_document() {
        let docs = vec![doc("dup", "first version"), doc("dup", "second version")];
        let result = hash_retriever(RetrieverConfig {
            max_evidence: 50,
            ..RetrieverConfig::default()
        })
        .retrieve("version", &docs)
        .await
        .unwrap();
        let report = result.report();
        assert_eq!(report.passages.len(), 1);
        assert_eq!(report.passages[0].text, "first version");
    }

    // ------------------------------------------------------------------
    // Failures and cancellation
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn embedder_failure_is_an_error_not_a_fallback() {
        let retriever = HybridRetriever::new(Arc::new(FailingEmbedder), RetrieverConfig::default());
        let err = retriever
            .retrieve("rate limit", &rate_limit_docs())
            .await
            .unwrap_err();
        assert!(matches!(err, SentinelError::Embedding(_)));
    }

    #[tokio::test]
    async fn dropping_the_future_cancels_retrieval() {
        let retriever = HybridRetriever::new(
            Arc::new(SlowEmbedder {
                inner: HashEmbedder::default(),
                delay: Duration::from_secs(30),
            }),
            RetrieverConfig::default(),
        );
        let docs = rate_limit_docs();
        let outcome =
            tokio::time::timeout(Duration::from_millis(20), retriever.retrieve("q", &docs)).await;
        assert!(outcome.is_err(), "retrieval should have been cancelled");
    }

    // ------------------------------------------------------------------
    // Cache
    // ------------------------------------------------------------------

    #[cfg(feature = "cache")]
    #[tokio::test]
    async fn cached_vectors_skip_re_embedding_and_match_uncached() {
        let embedder = Arc::new(CountingEmbedder::default());
        let cache = Arc::new(PassageVectorCache::open_in_memory().unwrap());
        let retriever = HybridRetriever::new(embedder.clone(), RetrieverConfig::default())
            .with_cache(cache.clone());
        let docs = rate_limit_docs();

        let first = retriever.retrieve("rate limit", &docs).await.unwrap();
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);
        let second = retriever.retrieve("rate limit", &docs).await.unwrap();
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);

        let uncached = hash_retriever(RetrieverConfig::default())
            .retrieve("rate limit", &docs)
            .await
            .unwrap();
        assert_eq!(first, uncached);
        assert_eq!(cache.len().unwrap(), 2);
    }

    #[cfg(feature = "cache")]
    #[tokio::test]
    async fn changed_content_is_re_embedded() {
        let embedder = Arc::new(CountingEmbedder::default());
        let cache = Arc::new(PassageVectorCache::open_in_memory().unwrap());
        let retriever = HybridRetriever::new(embedder.clone(), RetrieverConfig::default())
            .with_cache(cache);

        retriever
            .retrieve("q", &[doc("d", "old text")])
            .await
            .unwrap();
        retriever
            .retrieve("q", &[doc("d", "new text")])
            .await
            .unwrap();
        assert_eq!(embedder.batches.load(Ordering::SeqCst), 2);
    }
}
