//! Error types for docdex operations.
//!
//! This module provides the error hierarchy using `thiserror` for all
//! pipeline stages: parsing, chunking, indexing, retrieval, summarization
//! and metadata storage.

use thiserror::Error;

/// Result type alias for docdex operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for docdex operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input validation failed (bad slug, empty query, unknown identifier).
    #[error("invalid input: {message}")]
    Validation {
        /// Description of the rejected input.
        message: String,
    },

    /// A required resource is absent.
    #[error("not found: {0}")]
    NotFound(#[from] NotFound),

    /// Document already exists and `force_update` was not set.
    #[error("document '{slug}' already exists (use --force to overwrite)")]
    Conflict {
        /// Slug that collided.
        slug: String,
    },

    /// Parsing or chunking failure.
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),

    /// Index build, persistence or upsert failure.
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// Failure in an external collaborator (LLM, vector database).
    #[error("downstream error: {0}")]
    Downstream(#[from] DownstreamError),

    /// Post-ingest verification found a mismatch.
    #[error("data integrity: {message}")]
    Integrity {
        /// Description of the mismatch.
        message: String,
    },

    /// Metadata store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

/// Absent resources that callers may degrade around.
#[derive(Error, Debug)]
pub enum NotFound {
    /// Document missing from the relational store.
    #[error("document not found: {identifier}")]
    Document {
        /// Identifier that failed to resolve.
        identifier: String,
    },

    /// Lexical index artifact missing on disk.
    #[error("lexical index artifact not found: {path}")]
    IndexArtifact {
        /// Expected artifact path.
        path: String,
    },

    /// Vector collection absent from the backend.
    #[error("vector collection not found: {name}")]
    Collection {
        /// Collection name.
        name: String,
    },
}

/// Parsing and chunking errors.
#[derive(Error, Debug)]
pub enum ParserError {
    /// Source could not be read or decoded.
    #[error("unreadable source: {path}: {reason}")]
    UnreadableSource {
        /// Path to the source file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Parser produced no structural units.
    #[error("no content: source yielded zero units")]
    NoContent,

    /// Token encoder failure (fatal for the current ingest).
    #[error("token encoder error: {0}")]
    TokenEncoder(String),

    /// Invalid split pattern supplied by the caller.
    #[error("invalid split pattern: {0}")]
    Pattern(String),

    /// Invalid chunking configuration.
    #[error("overlap {overlap} must be less than max_tokens {max_tokens}")]
    OverlapTooLarge {
        /// Requested overlap in tokens.
        overlap: usize,
        /// Requested window in tokens.
        max_tokens: usize,
    },

    /// Unknown document type name.
    #[error("unknown document type: {name}")]
    UnknownDocType {
        /// Name that failed to parse.
        name: String,
    },
}

/// Lexical and vector index errors.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Artifact bytes could not be decoded.
    #[error("corrupt index artifact: {0}")]
    Corrupt(String),

    /// Artifact was written by an incompatible version.
    #[error("index artifact version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version found in the artifact.
        found: u32,
        /// Version this build understands.
        expected: u32,
    },

    /// Artifact could not be serialized.
    #[error("failed to encode index artifact: {0}")]
    Encode(String),

    /// Vector backend rejected an upsert.
    #[error("upsert rejected: {0}")]
    UpsertRejected(String),
}

/// External collaborator errors.
#[derive(Error, Debug)]
pub enum DownstreamError {
    /// LLM call failed after retries.
    #[error("LLM call failed: {0}")]
    Llm(String),

    /// Vector database transport error.
    #[error("vector database error: {0}")]
    VectorTransport(String),

    /// Embedding generation failed.
    #[error("embedding failed: {0}")]
    Embedding(String),
}

/// Relational metadata store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Serialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// File I/O errors.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

// Implement From traits for standard library and dependency errors

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for ParserError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Convenience constructor for validation failures.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Convenience constructor for integrity failures.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Whether this error is a degradable `NotFound` (query side may fall
    /// back to the complementary index).
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
