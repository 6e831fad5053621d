//! Document-scoped query surface.
//!
//! Wraps the hybrid retriever with identifier resolution, hydration and
//! the conversation diversifier, and folds failures into a structured
//! response: an absent `error` with zero results is a legitimate empty
//! result, distinct from an error.

use crate::index::{LexicalIndex, StoredChunk, VectorIndex};
use crate::parse::DocType;
use crate::search::{HybridRetriever, SearchOptions, diversify};
use crate::store::MetaStore;
use serde::Serialize;
use tracing::{debug, error};

/// Chunk text in responses is truncated to this many characters.
const MAX_RESPONSE_CHARS: usize = 800;

/// One hit in a query response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkHit {
    /// Chunk id.
    pub id: String,
    /// Chunk text, truncated to the response budget.
    pub text: String,
}

/// Structured result of a document-scoped search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// The query as asked.
    pub query: String,
    /// The document identifier as supplied by the caller.
    pub document: String,
    /// Fused chunk ids.
    pub chunk_ids: Vec<String>,
    /// Hydrated hits.
    pub chunks: Vec<ChunkHit>,
    /// Number of hits returned.
    pub num_results: usize,
    /// Present only on failure; the query is echoed above.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    fn failure(query: &str, document: &str, message: String) -> Self {
        Self {
            query: query.to_string(),
            document: document.to_string(),
            chunk_ids: Vec::new(),
            chunks: Vec::new(),
            num_results: 0,
            error: Some(message),
        }
    }
}

/// Per-query options on top of the retriever's.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Retrieval options.
    pub search: SearchOptions,
    /// Apply the conversation diversifier to conversation documents.
    pub diversify: bool,
}

/// Searches one document and returns the structured response.
///
/// Never returns an error: failures land in `response.error` with the
/// offending query echoed.
pub async fn search_document(
    store: &MetaStore,
    lexical: Option<&LexicalIndex>,
    vector: Option<&VectorIndex>,
    query: &str,
    identifier: &str,
    options: &QueryOptions,
) -> SearchResponse {
    let slug = match store.resolve_slug(identifier) {
        Ok(Some(slug)) => slug,
        Ok(None) => {
            return SearchResponse::failure(
                query,
                identifier,
                format!("document not found: {identifier}"),
            );
        }
        Err(e) => return SearchResponse::failure(query, identifier, e.to_string()),
    };
    let doc_type = match store.get_document(&slug) {
        Ok(record) => record.map(|r| r.doc_type),
        Err(e) => return SearchResponse::failure(query, identifier, e.to_string()),
    };

    let retriever = HybridRetriever::new(lexical, vector);
    let chunk_ids = match retriever
        .id_search(query, Some(&slug), &options.search)
        .await
    {
        Ok(ids) => ids,
        Err(e) => {
            error!(query, error = %e, "search failed");
            return SearchResponse::failure(query, identifier, e.to_string());
        }
    };
    debug!(query, results = chunk_ids.len(), "hybrid search returned ids");

    // Hydrate from the vector payloads; fall back to lexical raw text
    // when the vector index is absent
    let hydrated: Vec<StoredChunk> = if let Some(vector) = vector {
        match vector.get_by_ids(&chunk_ids).await {
            Ok(chunks) => chunks,
            Err(e) => return SearchResponse::failure(query, identifier, e.to_string()),
        }
    } else {
        hydrate_from_lexical(lexical, &chunk_ids)
    };

    let selected = if options.diversify && doc_type == Some(DocType::Conversation) {
        diversify(&hydrated, None)
    } else {
        hydrated
    };

    let chunks: Vec<ChunkHit> = selected
        .iter()
        .map(|c| ChunkHit {
            id: c.id.clone(),
            text: truncate_chars(&c.text, MAX_RESPONSE_CHARS),
        })
        .collect();

    SearchResponse {
        query: query.to_string(),
        document: identifier.to_string(),
        chunk_ids: chunks.iter().map(|c| c.id.clone()).collect(),
        num_results: chunks.len(),
        chunks,
        error: None,
    }
}

fn hydrate_from_lexical(lexical: Option<&LexicalIndex>, ids: &[String]) -> Vec<StoredChunk> {
    let Some(index) = lexical else {
        return Vec::new();
    };
    ids.iter()
        .filter_map(|wanted| {
            index
                .entries()
                .find(|(id, _)| *id == wanted.as_str())
                .map(|(id, text)| StoredChunk {
                    id: id.to_string(),
                    text: text.to_string(),
                    metadata: crate::chunk::ChunkMetadata::default(),
                })
        })
        .collect()
}

/// Truncates on a char boundary, appending an ellipsis when shortened.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}
