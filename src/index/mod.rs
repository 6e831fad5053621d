//! The two retrieval indexes: lexical BM25 and the dense-vector adapter.
//!
//! Both index the same chunks; the pipeline keeps them in step at the
//! document level. The lexical index is owned, in-process state persisted
//! to a versioned artifact; the vector index is an adapter over an
//! external Qdrant collection.

pub mod lexical;
pub mod vector;

pub use lexical::{LexicalIndex, STOPWORDS, tokenize};
pub use vector::{StoredChunk, VectorIndex};

/// A scored retrieval hit from either index.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Chunk id.
    pub id: String,
    /// Chunk text as indexed.
    pub text: String,
    /// Index-specific relevance score (BM25 or cosine similarity).
    pub score: f64,
}
