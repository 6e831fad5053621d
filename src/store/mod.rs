//! Metadata store adapter (C10).
//!
//! SQLite-backed persistence for document records and the two summary
//! levels. Natural keys with ON CONFLICT upserts; document deletion
//! cascades to summaries.

mod schema;
mod sqlite;

pub use sqlite::MetaStore;

use crate::parse::DocType;
use serde::{Deserialize, Serialize};

/// A stored document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Internal row id.
    pub doc_id: i64,
    /// Short stable identifier, unique.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Optional author.
    pub author: Option<String>,
    /// Document type.
    pub doc_type: DocType,
    /// Chunk count at last ingest.
    pub num_chunks: usize,
    /// Character count at last ingest.
    pub num_chars: usize,
    /// Unix timestamp of the last ingest.
    pub added_at: i64,
    /// Type-specific attributes from the parser.
    pub metadata: serde_json::Value,
}

/// Fields for inserting or replacing a document record.
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    /// Short stable identifier.
    pub slug: &'a str,
    /// Display title.
    pub title: &'a str,
    /// Optional author.
    pub author: Option<&'a str>,
    /// Document type.
    pub doc_type: DocType,
    /// Chunk count.
    pub num_chunks: usize,
    /// Character count.
    pub num_chars: usize,
    /// Type-specific attributes.
    pub metadata: serde_json::Value,
}
