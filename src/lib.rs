//! # docdex
//!
//! Core retrieval and indexing subsystem for a multi-format
//! retrieval-augmented document assistant.
//!
//! docdex ingests heterogeneous long-form documents (books, scripts,
//! transcribed conversations, technical manuals, reports), decomposes
//! each into token-budgeted chunks with stable identifiers, and indexes
//! them twice: a BM25 lexical index and a dense-vector collection. Ranked
//! lookups fuse the two rankings per query; a hierarchical summarization
//! layer produces per-section and per-document digests.
//!
//! ## Features
//!
//! - **Format parsers**: chapter / scene / turn / section decomposition
//! - **Stable chunk ids**: `{slug}_{unit:02}_{ordinal:03}_{hash7}`
//! - **Hybrid retrieval**: weighted-rank and reciprocal-rank fusion
//! - **Conversation diversifier**: temporal + speaker spread
//! - **Map-reduce summaries**: bounded-concurrency LLM orchestration

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
// Note: unsafe is needed for memory-mapped I/O (memmap2)
#![warn(unsafe_code)]

pub mod chunk;
pub mod cli;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod io;
pub mod parse;
pub mod query;
pub mod search;
pub mod store;
pub mod summarize;
pub mod token;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use chunk::{Chunk, ChunkMetadata, ChunkParams};
pub use parse::{DocType, DocumentParser, StructuralUnit, parser_for};
pub use token::TokenCodec;

// Re-export index types
pub use index::{LexicalIndex, ScoredChunk, StoredChunk, VectorIndex};

// Re-export retrieval types
pub use search::{
    FusionMethod, HybridRetriever, SearchOptions, preprocess_query, rrf_fusion,
    weighted_rank_fusion,
};

// Re-export pipeline surfaces
pub use ingest::{IngestReport, IngestRequest, Pipeline};
pub use query::{QueryOptions, SearchResponse, search_document};

// Re-export storage and summarization types
pub use store::{DocumentRecord, MetaStore};
pub use summarize::{SectionSummary, Summarizer, SummaryModel};

// Re-export embedding types
#[cfg(feature = "fastembed-embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use embedding::{DEFAULT_DIMENSIONS, Embedder, FallbackEmbedder, create_embedder};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
