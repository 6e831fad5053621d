//! Relational schema for document metadata and summaries.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Document records (one per ingested source)
CREATE TABLE IF NOT EXISTS documents (
    doc_id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    author TEXT,
    doc_type TEXT NOT NULL,
    num_chunks INTEGER NOT NULL DEFAULT 0,
    num_chars INTEGER NOT NULL DEFAULT 0,
    added_at INTEGER NOT NULL,
    metadata TEXT  -- JSON, type-specific attributes
);

CREATE INDEX IF NOT EXISTS idx_documents_title ON documents(title);

-- Per-unit digests, replaced on re-ingest
CREATE TABLE IF NOT EXISTS section_summaries (
    doc_slug TEXT NOT NULL REFERENCES documents(slug) ON DELETE CASCADE,
    unit_number INTEGER NOT NULL,
    summary TEXT NOT NULL,
    PRIMARY KEY (doc_slug, unit_number)
);

-- Whole-document digest, singleton per document
CREATE TABLE IF NOT EXISTS document_summaries (
    doc_slug TEXT PRIMARY KEY REFERENCES documents(slug) ON DELETE CASCADE,
    summary TEXT NOT NULL
);
";

/// SQL to check if the schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get the schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set the schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";
