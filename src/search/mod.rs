//! Hybrid retrieval (C6) with adaptive preprocessing (C7) and the
//! conversation diversifier (C8).
//!
//! A query fans out to the lexical and vector indexes concurrently, both
//! scoped by the document filter, and the two rankings are fused into a
//! single top-k id list. Either index may be absent; retrieval degrades
//! to the surviving side.

mod diversify;
mod fusion;
mod preprocess;

pub use diversify::{diversify, parse_timestamp};
pub use fusion::{RRF_C, rrf_fusion, weighted_rank_fusion};
pub use preprocess::{DEFAULT_ALPHA, QUERY_STOPWORDS, dynamic_alpha, preprocess_query};

use crate::error::{Error, Result};
use crate::index::{LexicalIndex, VectorIndex};
use std::time::Duration;
use tracing::{info, warn};

/// Default number of fused results.
pub const DEFAULT_TOP_K: usize = 7;

/// Default candidate oversampling multiplier.
pub const DEFAULT_CANDIDATE_MULTIPLIER: usize = 3;

/// Fusion scheme selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FusionMethod {
    /// Alpha-weighted reciprocal rank (the deployment default).
    #[default]
    WeightedRank,
    /// Parameter-free Reciprocal Rank Fusion.
    Rrf,
}

/// Per-query retrieval options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Number of fused results to return.
    pub top_k: usize,
    /// Whether to stopword-drop the lexical query.
    pub preprocess: bool,
    /// Whether to pick alpha from the query shape.
    pub dynamic_alpha: bool,
    /// Base alpha for weighted fusion.
    pub alpha: f64,
    /// Candidates requested per index = `top_k * candidate_multiplier`.
    pub candidate_multiplier: usize,
    /// Fusion scheme.
    pub fusion: FusionMethod,
    /// Ambient deadline; on expiry the partial result is discarded.
    pub timeout: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            preprocess: true,
            dynamic_alpha: false,
            alpha: DEFAULT_ALPHA,
            candidate_multiplier: DEFAULT_CANDIDATE_MULTIPLIER,
            fusion: FusionMethod::default(),
            timeout: None,
        }
    }
}

impl SearchOptions {
    /// Creates options with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result count.
    #[must_use]
    pub const fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Enables or disables query preprocessing.
    #[must_use]
    pub const fn with_preprocess(mut self, enabled: bool) -> Self {
        self.preprocess = enabled;
        self
    }

    /// Enables or disables dynamic alpha.
    #[must_use]
    pub const fn with_dynamic_alpha(mut self, enabled: bool) -> Self {
        self.dynamic_alpha = enabled;
        self
    }

    /// Sets the candidate multiplier.
    #[must_use]
    pub const fn with_candidate_multiplier(mut self, multiplier: usize) -> Self {
        self.candidate_multiplier = multiplier;
        self
    }

    /// Sets the fusion scheme.
    #[must_use]
    pub const fn with_fusion(mut self, fusion: FusionMethod) -> Self {
        self.fusion = fusion;
        self
    }

    /// Sets the ambient deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Hybrid retriever over the two indexes.
///
/// Holds borrowed index handles; the CLI and query surfaces construct
/// and thread them.
pub struct HybridRetriever<'a> {
    lexical: Option<&'a LexicalIndex>,
    vector: Option<&'a VectorIndex>,
}

impl<'a> HybridRetriever<'a> {
    /// Creates a retriever over whichever indexes are available.
    #[must_use]
    pub const fn new(lexical: Option<&'a LexicalIndex>, vector: Option<&'a VectorIndex>) -> Self {
        Self { lexical, vector }
    }

    /// Runs a document-scoped hybrid search and returns fused chunk ids.
    ///
    /// The lexical side receives the preprocessed query; the vector side
    /// always gets the original string. With one index absent the other's
    /// ranking is returned directly; with both absent the result is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns an error on vector transport failure or deadline expiry.
    pub async fn id_search(
        &self,
        query: &str,
        slug_filter: Option<&str>,
        options: &SearchOptions,
    ) -> Result<Vec<String>> {
        if query.trim().is_empty() {
            return Err(Error::validation("empty query"));
        }

        match options.timeout {
            Some(deadline) => tokio::time::timeout(
                deadline,
                self.id_search_inner(query, slug_filter, options),
            )
            .await
            .map_err(|_| Error::validation(format!("query deadline expired: {query}")))?,
            None => self.id_search_inner(query, slug_filter, options).await,
        }
    }

    async fn id_search_inner(
        &self,
        query: &str,
        slug_filter: Option<&str>,
        options: &SearchOptions,
    ) -> Result<Vec<String>> {
        let alpha = if options.dynamic_alpha {
            dynamic_alpha(query, options.alpha)
        } else {
            options.alpha
        };
        let lexical_query = if options.preprocess {
            preprocess_query(query)
        } else {
            query.to_string()
        };

        let candidates = options.top_k * options.candidate_multiplier.max(1);

        // Degenerate modes first
        let (Some(lexical), Some(vector)) = (self.lexical, self.vector) else {
            return match (self.lexical, self.vector) {
                (None, Some(vector)) => {
                    warn!("lexical index absent, vector-only search");
                    Ok(vector
                        .search(query, options.top_k, slug_filter)
                        .await?
                        .into_iter()
                        .map(|c| c.id)
                        .collect())
                }
                (Some(lexical), None) => {
                    warn!("vector index absent, lexical-only search");
                    Ok(lexical.id_search(&lexical_query, options.top_k, slug_filter))
                }
                _ => Ok(Vec::new()),
            };
        };

        // Lexical scoring is in-memory CPU work; the vector call suspends
        // on RPC. Run them concurrently within the request.
        let (vector_hits, lexical_ids) = tokio::join!(
            vector.search(query, candidates, slug_filter),
            async { lexical.id_search(&lexical_query, candidates, slug_filter) },
        );
        let vector_ids: Vec<String> = vector_hits?.into_iter().map(|c| c.id).collect();

        let fused = match options.fusion {
            FusionMethod::WeightedRank => {
                weighted_rank_fusion(&lexical_ids, &vector_ids, alpha, options.top_k)
            }
            FusionMethod::Rrf => rrf_fusion(&lexical_ids, &vector_ids, options.top_k),
        };
        info!(
            lexical = lexical_ids.len(),
            vector = vector_ids.len(),
            fused = fused.len(),
            alpha,
            "hybrid fusion completed"
        );
        Ok(fused)
    }
}
