//! Lexical BM25 index (C4).
//!
//! Okapi BM25 over `\w+` tokens with a fixed English stopword set.
//! State lives in parallel arrays indexed by insertion order; the whole
//! index serializes to a single versioned artifact. There is no per-chunk
//! deletion: document removal rebuilds the index from surviving entries.

use crate::error::{IndexError, NotFound, Result};
use crate::index::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;
use tracing::info;

/// Artifact format version; a mismatch on load fails loudly.
pub const ARTIFACT_VERSION: u32 = 1;

/// Default BM25 term-frequency saturation.
pub const DEFAULT_K1: f64 = 1.5;

/// Default BM25 length normalization.
pub const DEFAULT_B: f64 = 0.75;

/// Fixed English stopword set for index tokenization.
pub static STOPWORDS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ["the", "a", "an", "and", "of", "in", "to"].into());

static WORD: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = regex::Regex::new(r"\w+").unwrap();
    re
});

/// Lowercases, extracts `\w+` runs and drops stopwords.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD.find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|w| !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Serialized artifact layout.
///
/// The version field leads so that incompatible artifacts are rejected
/// before the body is interpreted.
#[derive(Debug, Serialize, Deserialize)]
struct Artifact {
    version: u32,
    docs: Vec<Vec<String>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    df: HashMap<String, usize>,
    idf: HashMap<String, f64>,
    n: usize,
    ids: Vec<String>,
    raw_docs: Vec<String>,
    k1: f64,
    b: f64,
}

/// In-process BM25 index over chunk texts.
///
/// # Examples
///
/// ```
/// use docdex::index::LexicalIndex;
///
/// let mut index = LexicalIndex::new();
/// index.build(&[
///     ("aiw_01_001_0000000".to_string(), "down the rabbit hole".to_string()),
///     ("aiw_02_001_0000000".to_string(), "the pool of tears".to_string()),
/// ]);
/// let hits = index.search("rabbit", 5, None);
/// assert_eq!(hits[0].id, "aiw_01_001_0000000");
/// ```
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    k1: f64,
    b: f64,
    docs: Vec<Vec<String>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    df: HashMap<String, usize>,
    idf: HashMap<String, f64>,
    n: usize,
    ids: Vec<String>,
    raw_docs: Vec<String>,
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl LexicalIndex {
    /// Creates an empty index with default BM25 constants.
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(DEFAULT_K1, DEFAULT_B)
    }

    /// Creates an empty index with explicit BM25 constants.
    #[must_use]
    pub fn with_params(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            docs: Vec::new(),
            doc_lens: Vec::new(),
            avgdl: 0.0,
            df: HashMap::new(),
            idf: HashMap::new(),
            n: 0,
            ids: Vec::new(),
            raw_docs: Vec::new(),
        }
    }

    /// Number of indexed chunks.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.n
    }

    /// Whether the index holds no chunks.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Iterates `(id, raw_text)` pairs in insertion order.
    ///
    /// Used for the rebuild-on-delete path and for appending on
    /// incremental ingest.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.raw_docs.iter().map(String::as_str))
    }

    /// Builds the index from `(id, text)` chunk pairs, replacing any
    /// previous state.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(&mut self, chunks: &[(String, String)]) {
        self.docs = Vec::with_capacity(chunks.len());
        self.ids = Vec::with_capacity(chunks.len());
        self.raw_docs = Vec::with_capacity(chunks.len());
        self.df = HashMap::new();

        for (id, text) in chunks {
            self.docs.push(tokenize(text));
            self.ids.push(id.clone());
            self.raw_docs.push(text.clone());
        }

        self.n = self.docs.len();
        self.doc_lens = self.docs.iter().map(Vec::len).collect();
        self.avgdl = if self.n > 0 {
            self.doc_lens.iter().sum::<usize>() as f64 / self.n as f64
        } else {
            0.0
        };

        for doc in &self.docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for word in unique {
                *self.df.entry(word.to_string()).or_insert(0) += 1;
            }
        }

        self.idf = self
            .df
            .iter()
            .map(|(word, &freq)| {
                let idf =
                    ((self.n as f64 - freq as f64 + 0.5) / (freq as f64 + 0.5) + 1.0).ln();
                (word.clone(), idf)
            })
            .collect();
    }

    /// BM25 score of document `idx` against `query_tokens`.
    #[allow(clippy::cast_precision_loss)]
    fn score(&self, query_tokens: &[String], idx: usize) -> f64 {
        let Some(doc) = self.docs.get(idx) else {
            return 0.0;
        };
        let doc_len = self.doc_lens.get(idx).copied().unwrap_or(0) as f64;

        let mut tf: HashMap<&str, usize> = HashMap::new();
        for term in doc {
            *tf.entry(term.as_str()).or_insert(0) += 1;
        }

        let mut score = 0.0;
        for term in query_tokens {
            let Some(&freq) = tf.get(term.as_str()) else {
                continue;
            };
            let idf = self.idf.get(term.as_str()).copied().unwrap_or(0.0);
            let freq = freq as f64;
            let numer = freq * (self.k1 + 1.0);
            let denom = freq + self.k1 * (1.0 - self.b + self.b * doc_len / self.avgdl);
            score += idf * (numer / denom);
        }
        score
    }

    /// Searches the index.
    ///
    /// When `slug_filter` is given, only chunks whose id begins with
    /// `{slug}_` are scored. Results are ordered by descending score;
    /// ties break by ascending insertion order.
    #[must_use]
    pub fn search(&self, query: &str, top_k: usize, slug_filter: Option<&str>) -> Vec<ScoredChunk> {
        let query_tokens = tokenize(query);

        let prefix = slug_filter.map(|slug| format!("{slug}_"));
        let mut scored: Vec<(usize, f64)> = (0..self.n)
            .filter(|&i| {
                prefix
                    .as_ref()
                    .is_none_or(|p| self.ids[i].starts_with(p.as_str()))
            })
            .map(|i| (i, self.score(&query_tokens, i)))
            .collect();

        // Descending score, earlier insertion wins ties
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                id: self.ids[i].clone(),
                text: self.raw_docs[i].clone(),
                score,
            })
            .collect()
    }

    /// Searches and returns ids only.
    #[must_use]
    pub fn id_search(&self, query: &str, top_k: usize, slug_filter: Option<&str>) -> Vec<String> {
        self.search(query, top_k, slug_filter)
            .into_iter()
            .map(|c| c.id)
            .collect()
    }

    /// Persists the index to a single versioned binary artifact.
    ///
    /// The write is atomic (temp file + rename), so readers never observe
    /// a partial rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let artifact = Artifact {
            version: ARTIFACT_VERSION,
            docs: self.docs.clone(),
            doc_lens: self.doc_lens.clone(),
            avgdl: self.avgdl,
            df: self.df.clone(),
            idf: self.idf.clone(),
            n: self.n,
            ids: self.ids.clone(),
            raw_docs: self.raw_docs.clone(),
            k1: self.k1,
            b: self.b,
        };
        let bytes = bincode::serde::encode_to_vec(&artifact, bincode::config::standard())
            .map_err(|e| IndexError::Encode(e.to_string()))?;
        crate::io::write_atomic(&path, &bytes)?;
        info!(path = %path.as_ref().display(), chunks = self.n, "lexical index saved");
        Ok(())
    }

    /// Loads an index from its artifact.
    ///
    /// # Errors
    ///
    /// - [`NotFound::IndexArtifact`] when the file is missing (callers may
    ///   degrade to vector-only search)
    /// - [`IndexError::VersionMismatch`] for incompatible artifacts
    /// - [`IndexError::Corrupt`] when the bytes fail to decode
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NotFound::IndexArtifact {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let bytes = std::fs::read(path)?;
        let (artifact, _): (Artifact, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| IndexError::Corrupt(e.to_string()))?;

        if artifact.version != ARTIFACT_VERSION {
            return Err(IndexError::VersionMismatch {
                found: artifact.version,
                expected: ARTIFACT_VERSION,
            }
            .into());
        }

        info!(path = %path.display(), chunks = artifact.n, "lexical index loaded");
        Ok(Self {
            k1: artifact.k1,
            b: artifact.b,
            docs: artifact.docs,
            doc_lens: artifact.doc_lens,
            avgdl: artifact.avgdl,
            df: artifact.df,
            idf: artifact.idf,
            n: artifact.n,
            ids: artifact.ids,
            raw_docs: artifact.raw_docs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, text: &str) -> (String, String) {
        (id.to_string(), text.to_string())
    }

    fn sample_index() -> LexicalIndex {
        let mut index = LexicalIndex::new();
        index.build(&[
            chunk("aiw_01_001_aaaaaaa", "Alice fell down the rabbit hole"),
            chunk("aiw_02_001_bbbbbbb", "The pool of tears grew around Alice"),
            chunk("gtr_01_001_ccccccc", "A tale of two cities begins with the best of times"),
        ]);
        index
    }

    #[test]
    fn test_tokenize_drops_stopwords() {
        let tokens = tokenize("The Rabbit and the Queen of Hearts");
        assert_eq!(tokens, vec!["rabbit", "queen", "hearts"]);
    }

    #[test]
    fn test_tokenize_word_runs() {
        let tokens = tokenize("semi-structured: data, 42 items!");
        assert_eq!(tokens, vec!["semi", "structured", "data", "42", "items"]);
    }

    #[test]
    fn test_build_state() {
        let index = sample_index();
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
        assert!(index.avgdl > 0.0);
        assert!(index.idf.contains_key("rabbit"));
    }

    #[test]
    fn test_search_ranks_matching_chunk_first() {
        let index = sample_index();
        let hits = index.search("rabbit hole", 3, None);
        assert_eq!(hits[0].id, "aiw_01_001_aaaaaaa");
        assert!(hits[0].score > 0.0);
    }

    #[test]
    fn test_search_document_filter() {
        let index = sample_index();
        let hits = index.search("alice", 5, Some("aiw"));
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.id.starts_with("aiw_")));

        let hits = index.search("alice", 5, Some("gtr"));
        // The gtr chunk never mentions alice: scored but zero
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_search_no_match_scores_zero() {
        let index = sample_index();
        let hits = index.search("zeppelin", 3, None);
        assert!(hits.iter().all(|h| h.score == 0.0));
    }

    #[test]
    fn test_tie_break_by_insertion_order() {
        let mut index = LexicalIndex::new();
        index.build(&[
            chunk("d_01_001_aaaaaaa", "identical text body"),
            chunk("d_02_001_bbbbbbb", "identical text body"),
        ]);
        let hits = index.search("identical", 2, None);
        assert_eq!(hits[0].id, "d_01_001_aaaaaaa");
        assert_eq!(hits[1].id, "d_02_001_bbbbbbb");
    }

    #[test]
    fn test_idf_formula() {
        let index = sample_index();
        // "alice" appears in 2 of 3 docs: idf = ln((3 - 2 + 0.5)/(2 + 0.5) + 1)
        let expected = (1.5_f64 / 2.5 + 1.0).ln();
        let actual = index.idf.get("alice").copied().unwrap();
        assert!((actual - expected).abs() < 1e-12);
    }

    #[test]
    fn test_bm25_monotonicity_unrelated_doc() {
        // Adding a document without the query term must not change an
        // existing document's score beyond the idf shift from the new N
        let mut small = LexicalIndex::new();
        small.build(&[
            chunk("a_01_001_aaaaaaa", "gryphon danced a quadrille"),
            chunk("a_02_001_bbbbbbb", "the mock turtle wept"),
        ]);
        let before = small.search("gryphon", 1, None)[0].score;

        let mut bigger = LexicalIndex::new();
        bigger.build(&[
            chunk("a_01_001_aaaaaaa", "gryphon danced a quadrille"),
            chunk("a_02_001_bbbbbbb", "the mock turtle wept"),
            chunk("a_03_001_ccccccc", "lobsters lined upon shore"),
        ]);
        let after = bigger.search("gryphon", 1, None)[0].score;

        // Same df, larger N: idf grows, and avgdl shifts slightly. The
        // score stays within a small factor of the original.
        assert!(after >= before);
        assert!((after - before) / before < 0.6);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25.idx");

        let index = sample_index();
        index.save(&path).unwrap();

        let loaded = LexicalIndex::load(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        // No recomputation needed: scores match exactly
        let a = index.search("rabbit hole", 3, None);
        let b = loaded.search("rabbit hole", 3, None);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.id, y.id);
            assert!((x.score - y.score).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let err = LexicalIndex::load("/nope/bm25.idx").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_corrupt_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bm25.idx");
        std::fs::write(&path, b"not an artifact").unwrap();
        let err = LexicalIndex::load(&path).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Index(IndexError::Corrupt(_) | IndexError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_entries_roundtrip() {
        let index = sample_index();
        let entries: Vec<(String, String)> = index
            .entries()
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect();
        assert_eq!(entries.len(), 3);

        let mut rebuilt = LexicalIndex::new();
        rebuilt.build(&entries);
        assert_eq!(rebuilt.len(), 3);
    }

    #[test]
    fn test_rebuild_after_document_delete() {
        let index = sample_index();
        let survivors: Vec<(String, String)> = index
            .entries()
            .filter(|(id, _)| !id.starts_with("aiw_"))
            .map(|(id, text)| (id.to_string(), text.to_string()))
            .collect();

        let mut rebuilt = LexicalIndex::new();
        rebuilt.build(&survivors);
        assert_eq!(rebuilt.len(), 1);
        assert!(rebuilt.search("alice", 5, Some("aiw")).is_empty());
    }

    #[test]
    fn test_empty_index_search() {
        let index = LexicalIndex::new();
        assert!(index.search("anything", 5, None).is_empty());
    }
}
