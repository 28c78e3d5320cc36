//! BM25 ranking over an in-memory passage list.
//!
//! This is the fallback path: it runs only when vector search returns no hits
//! at all, and its scores are never mixed with cosine scores.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Unbounded, non-negative BM25 score; only comparable with other `Bm25Score`s.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bm25Score(pub f64);

/// BM25 free parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalisation strength.
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// A passage's position in the ranked input and its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexicalHit {
    pub index: usize,
    pub score: Bm25Score,
}

/// Document frequency used for query terms that occur in no passage.
const ABSENT_DF: f64 = 0.5;

/// Lowercase, blank out everything outside `[a-z0-9_/.-]`, split on whitespace.
///
/// `/`, `.` and `-` survive so paths like `/v1/users` and versions like
/// `1.2.0` stay single tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' | '/' | '.' | '-' => c,
            _ => ' ',
        })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Rank every passage against `query` with default parameters.
pub fn rank(query: &str, passages: &[&str]) -> Vec<LexicalHit> {
    rank_with(query, passages, Bm25Params::default())
}

/// Rank every passage against `query`, highest score first.
///
/// The whole input is returned; callers truncate. Equal scores keep input
/// order. Each query token contributes once per occurrence in the query.
pub fn rank_with(query: &str, passages: &[&str], params: Bm25Params) -> Vec<LexicalHit> {
    let query_tokens = tokenize(query);
    let docs: Vec<Vec<String>> = passages.iter().map(|p| tokenize(p)).collect();
    let n = docs.len() as f64;

    let mut df: HashMap<&str, usize> = HashMap::new();
    for tokens in &docs {
        let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        for t in unique {
            *df.entry(t).or_default() += 1;
        }
    }

    let total_len: usize = docs.iter().map(Vec::len).sum();
    let avgdl = (total_len as f64 / n.max(1.0)).max(1.0);

    let idf: Vec<f64> = query_tokens
        .iter()
        .map(|t| {
            let dft = df.get(t.as_str()).map_or(ABSENT_DF, |&c| c as f64);
            (1.0 + (n - dft + 0.5) / (dft + 0.5)).ln()
        })
        .collect();

    let mut hits: Vec<LexicalHit> = docs
        .iter()
        .enumerate()
        .map(|(index, tokens)| {
            let mut tf: HashMap<&str, f64> = HashMap::new();
            for t in tokens {
                *tf.entry(t.as_str()).or_default() += 1.0;
            }
            let dl = tokens.len() as f64;
            let norm = params.k1 * (1.0 - params.b + params.b * dl / avgdl);

            let score = query_tokens
                .iter()
                .zip(&idf)
                .map(|(t, idf)| {
                    let f = tf.get(t.as_str()).copied().unwrap_or(0.0);
                    if f == 0.0 {
                        0.0
                    } else {
                        idf * (f * (params.k1 + 1.0)) / (f + norm)
                    }
                })
                .sum();
            LexicalHit {
                index,
                score: Bm25Score(score),
            }
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_keeps_paths_and_versions() {
        assert_eq!(
            tokenize("GET /v1/users returned HTTP-429 (v1.2.0)!"),
            vec!["get", "/v1/users", "returned", "http-429", "v1.2.0"]
        );
    }

    #[test]
    fn tokenize_blanks_non_ascii_and_drops_empties() {
        assert_eq!(tokenize("  Café\tlatency_ms  "), vec!["caf", "latency_ms"]);
        assert!(tokenize("!!! ???").is_empty());
    }

    #[test]
    fn relevant_passage_ranks_first() {
        let passages = [
            "Unrelated deployment notes about database migration.",
            "Rate limit exceeded for endpoint /v1/users. Retry after 30 seconds.",
        ];
        let hits = rank("rate limit exceeded /v1/users", &passages);
        assert_eq!(hits[0].index, 1);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[1].score, Bm25Score(0.0));
    }

    #[test]
    fn single_term_score_matches_formula() {
        // N = 2, df(rate) = 1, dl = 2 for both passages, avgdl = 2.
        let passages = ["rate limit", "other words"];
        let hits = rank("rate", &passages);
        let idf = (1.0f64 + (2.0 - 1.0 + 0.5) / (1.0 + 0.5)).ln();
        let expected = idf * (1.0 * 2.5) / (1.0 + 1.5 * (1.0 - 0.75 + 0.75 * 1.0));
        assert_eq!(hits[0].index, 0);
        assert!((hits[0].score.0 - expected).abs() < 1e-12);
    }

    #[test]
    fn repeated_query_tokens_count_per_occurrence() {
        let passages = ["timeout", "nothing"];
        let once = rank("timeout", &passages)[0].score.0;
        let twice = rank("timeout timeout", &passages)[0].score.0;
        assert!((twice - 2.0 * once).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_input_order() {
        let passages = ["alpha", "alpha", "beta"];
        let hits = rank("alpha", &passages);
        assert_eq!(hits[0].index, 0);
        assert_eq!(hits[1].index, 1);
        assert_eq!(hits[2].index, 2);
    }

    #[test]
    fn returns_every_passage() {
        let passages = ["a", "b", "c", "d"];
        assert_eq!(rank("zzz", &passages).len(), 4);
    }

    #[test]
    fn empty_corpus_and_empty_passages_do_not_divide_by_zero() {
        assert!(rank("anything", &[]).is_empty());
        let hits = rank("anything", &["", ""]);
        assert!(hits.iter().all(|h| h.score.0 == 0.0 && h.score.0.is_finite()));
    }

    #[test]
    fn shorter_passage_wins_on_equal_term_frequency() {
        let passages = [
            "timeout while calling upstream service over the network link",
            "timeout",
        ];
        let hits = rank("timeout", &passages);
        assert_eq!(hits[0].index, 1);
    }
}
