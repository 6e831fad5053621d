//! SQLite implementation of the metadata store.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only store non-negative values that fit in usize.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]

use crate::error::{Result, StoreError};
use crate::parse::DocType;
use crate::store::schema::{
    CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL,
};
use crate::store::{DocumentRecord, NewDocument};
use crate::summarize::SectionSummary;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

/// SQLite-backed metadata store.
///
/// # Examples
///
/// ```
/// use docdex::store::MetaStore;
///
/// let mut store = MetaStore::in_memory().unwrap();
/// store.init().unwrap();
/// assert!(!store.document_exists("ody").unwrap());
/// ```
pub struct MetaStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl MetaStore {
    /// Opens or creates the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database(e.to_string()))?;
        }

        let conn = Connection::open(&path).map_err(StoreError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StoreError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StoreError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory store (tests).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StoreError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates the schema if needed and records the version.
    ///
    /// # Errors
    ///
    /// Returns an error on schema creation failure or a future-version
    /// database.
    pub fn init(&mut self) -> Result<()> {
        let initialized: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StoreError::from)?;

        if initialized == 0 {
            self.conn
                .execute_batch(SCHEMA_SQL)
                .map_err(StoreError::from)?;
            self.conn
                .execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
                .map_err(StoreError::from)?;
            return Ok(());
        }

        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StoreError::from)?;
        let version: u32 = version.and_then(|v| v.parse().ok()).unwrap_or(0);
        if version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "database schema version {version} is newer than supported {CURRENT_SCHEMA_VERSION}"
            ))
            .into());
        }
        Ok(())
    }

    /// Resolves a document identifier (row id, slug, or title) to its
    /// slug.
    ///
    /// Numeric identifiers resolve by row id; otherwise exact slug match
    /// first, then case-insensitive title match.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn resolve_slug(&self, identifier: &str) -> Result<Option<String>> {
        if let Ok(doc_id) = identifier.parse::<i64>() {
            let slug: Option<String> = self
                .conn
                .query_row(
                    "SELECT slug FROM documents WHERE doc_id = ?",
                    params![doc_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(StoreError::from)?;
            return Ok(slug);
        }

        let slug: Option<String> = self
            .conn
            .query_row(
                "SELECT slug FROM documents WHERE slug = ?",
                params![identifier],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;
        if slug.is_some() {
            return Ok(slug);
        }

        let slug: Option<String> = self
            .conn
            .query_row(
                "SELECT slug FROM documents WHERE LOWER(title) = LOWER(?)",
                params![identifier],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;
        Ok(slug)
    }

    /// Whether a document with `slug` exists.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn document_exists(&self, slug: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM documents WHERE slug = ?",
                params![slug],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;
        Ok(found.is_some())
    }

    /// Inserts or replaces a document record by slug. Returns the row id.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn upsert_document(&mut self, doc: &NewDocument<'_>) -> Result<i64> {
        let metadata = serde_json::to_string(&doc.metadata).map_err(StoreError::from)?;
        let doc_id: i64 = self
            .conn
            .query_row(
                r"
            INSERT INTO documents (slug, title, author, doc_type, num_chunks, num_chars, added_at, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (slug) DO UPDATE
            SET title = excluded.title,
                author = excluded.author,
                doc_type = excluded.doc_type,
                num_chunks = excluded.num_chunks,
                num_chars = excluded.num_chars,
                added_at = excluded.added_at,
                metadata = excluded.metadata
            RETURNING doc_id
        ",
                params![
                    doc.slug,
                    doc.title,
                    doc.author,
                    doc.doc_type.as_str(),
                    doc.num_chunks as i64,
                    doc.num_chars as i64,
                    Self::now(),
                    metadata,
                ],
                |row| row.get(0),
            )
            .map_err(StoreError::from)?;
        Ok(doc_id)
    }

    /// Fetches a document record by slug.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn get_document(&self, slug: &str) -> Result<Option<DocumentRecord>> {
        self.conn
            .query_row(
                "SELECT doc_id, slug, title, author, doc_type, num_chunks, num_chars, added_at, metadata
                 FROM documents WHERE slug = ?",
                params![slug],
                Self::row_to_document,
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()).into())
    }

    /// Lists all documents ordered by slug.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT doc_id, slug, title, author, doc_type, num_chunks, num_chars, added_at, metadata
                 FROM documents ORDER BY slug",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map([], Self::row_to_document)
            .map_err(StoreError::from)?;
        let mut documents = Vec::new();
        for row in rows {
            documents.push(row.map_err(StoreError::from)?);
        }
        Ok(documents)
    }

    /// Deletes a document; summaries cascade. Returns whether a row was
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn delete_document(&mut self, slug: &str) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM documents WHERE slug = ?", params![slug])
            .map_err(StoreError::from)?;
        Ok(deleted > 0)
    }

    /// Upserts section summaries in bulk plus the document summary.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn store_summaries(
        &mut self,
        slug: &str,
        sections: &[SectionSummary],
        document_summary: &str,
    ) -> Result<()> {
        let tx = self.conn.transaction().map_err(StoreError::from)?;
        {
            let mut stmt = tx
                .prepare(
                    r"
                INSERT INTO section_summaries (doc_slug, unit_number, summary)
                VALUES (?, ?, ?)
                ON CONFLICT (doc_slug, unit_number) DO UPDATE SET summary = excluded.summary
            ",
                )
                .map_err(StoreError::from)?;
            for section in sections {
                stmt.execute(params![slug, section.unit_number, section.summary])
                    .map_err(StoreError::from)?;
            }
        }
        tx.execute(
            r"
            INSERT INTO document_summaries (doc_slug, summary)
            VALUES (?, ?)
            ON CONFLICT (doc_slug) DO UPDATE SET summary = excluded.summary
        ",
            params![slug, document_summary],
        )
        .map_err(StoreError::from)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(())
    }

    /// Whether a document summary exists for `slug`.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn summaries_exist(&self, slug: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM document_summaries WHERE doc_slug = ?",
                params![slug],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)?;
        Ok(found.is_some())
    }

    /// Reads one section summary.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn get_section_summary(&self, slug: &str, unit_number: u32) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT summary FROM section_summaries WHERE doc_slug = ? AND unit_number = ?",
                params![slug, unit_number],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()).into())
    }

    /// Reads all section summaries for a document, ordered by unit.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn get_all_section_summaries(&self, slug: &str) -> Result<Vec<(u32, String)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT unit_number, summary FROM section_summaries
                 WHERE doc_slug = ? ORDER BY unit_number",
            )
            .map_err(StoreError::from)?;
        let rows = stmt
            .query_map(params![slug], |row| {
                Ok((row.get::<_, i64>(0)? as u32, row.get::<_, String>(1)?))
            })
            .map_err(StoreError::from)?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row.map_err(StoreError::from)?);
        }
        Ok(summaries)
    }

    /// Reads the document summary.
    ///
    /// # Errors
    ///
    /// Returns an error on a database failure.
    pub fn get_document_summary(&self, slug: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT summary FROM document_summaries WHERE doc_slug = ?",
                params![slug],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()).into())
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
        let doc_type_str: String = row.get(4)?;
        let doc_type = doc_type_str.parse::<DocType>().unwrap_or(DocType::Book);
        let metadata_str: Option<String> = row.get(8)?;
        let metadata = metadata_str
            .and_then(|m| serde_json::from_str(&m).ok())
            .unwrap_or(serde_json::Value::Null);
        Ok(DocumentRecord {
            doc_id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            doc_type,
            num_chunks: row.get::<_, i64>(5)? as usize,
            num_chars: row.get::<_, i64>(6)? as usize,
            added_at: row.get(7)?,
            metadata,
        })
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MetaStore {
        let mut store = MetaStore::in_memory().unwrap();
        store.init().unwrap();
        store
    }

    fn new_doc<'a>(slug: &'a str, title: &'a str) -> NewDocument<'a> {
        NewDocument {
            slug,
            title,
            author: Some("Homer"),
            doc_type: DocType::Book,
            num_chunks: 12,
            num_chars: 34_000,
            metadata: serde_json::json!({"total_words": 5600}),
        }
    }

    #[test]
    fn test_init_idempotent() {
        let mut store = store();
        store.init().unwrap();
    }

    #[test]
    fn test_upsert_and_get_document() {
        let mut store = store();
        let doc_id = store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();
        assert!(doc_id > 0);

        let record = store.get_document("ody").unwrap().unwrap();
        assert_eq!(record.slug, "ody");
        assert_eq!(record.title, "The Odyssey");
        assert_eq!(record.author.as_deref(), Some("Homer"));
        assert_eq!(record.doc_type, DocType::Book);
        assert_eq!(record.num_chunks, 12);
        assert_eq!(record.metadata["total_words"], 5600);
        assert!(record.added_at > 0);
    }

    #[test]
    fn test_upsert_replaces_on_slug_conflict() {
        let mut store = store();
        let first = store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();
        let second = store
            .upsert_document(&new_doc("ody", "The Odyssey, Revised"))
            .unwrap();
        assert_eq!(first, second);

        let record = store.get_document("ody").unwrap().unwrap();
        assert_eq!(record.title, "The Odyssey, Revised");
    }

    #[test]
    fn test_resolve_slug_by_all_identifier_kinds() {
        let mut store = store();
        let doc_id = store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();

        assert_eq!(store.resolve_slug("ody").unwrap().as_deref(), Some("ody"));
        assert_eq!(
            store.resolve_slug("the odyssey").unwrap().as_deref(),
            Some("ody")
        );
        assert_eq!(
            store.resolve_slug(&doc_id.to_string()).unwrap().as_deref(),
            Some("ody")
        );
        assert_eq!(store.resolve_slug("missing").unwrap(), None);
    }

    #[test]
    fn test_document_exists() {
        let mut store = store();
        assert!(!store.document_exists("ody").unwrap());
        store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();
        assert!(store.document_exists("ody").unwrap());
    }

    #[test]
    fn test_store_and_read_summaries() {
        let mut store = store();
        store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();

        let sections = vec![
            SectionSummary {
                unit_number: 1,
                summary: "Telemachus despairs.".to_string(),
            },
            SectionSummary {
                unit_number: 2,
                summary: "Athena intervenes.".to_string(),
            },
        ];
        store
            .store_summaries("ody", &sections, "A long journey home.")
            .unwrap();

        assert!(store.summaries_exist("ody").unwrap());
        assert_eq!(
            store.get_section_summary("ody", 2).unwrap().as_deref(),
            Some("Athena intervenes.")
        );
        assert_eq!(store.get_section_summary("ody", 9).unwrap(), None);

        let all = store.get_all_section_summaries("ody").unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, 1);

        assert_eq!(
            store.get_document_summary("ody").unwrap().as_deref(),
            Some("A long journey home.")
        );
    }

    #[test]
    fn test_summaries_replaced_on_reingest() {
        let mut store = store();
        store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();

        let first = vec![SectionSummary {
            unit_number: 1,
            summary: "v1".to_string(),
        }];
        store.store_summaries("ody", &first, "doc v1").unwrap();

        let second = vec![SectionSummary {
            unit_number: 1,
            summary: "v2".to_string(),
        }];
        store.store_summaries("ody", &second, "doc v2").unwrap();

        assert_eq!(
            store.get_section_summary("ody", 1).unwrap().as_deref(),
            Some("v2")
        );
        assert_eq!(
            store.get_document_summary("ody").unwrap().as_deref(),
            Some("doc v2")
        );
    }

    #[test]
    fn test_delete_cascades_to_summaries() {
        let mut store = store();
        store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();
        store
            .store_summaries(
                "ody",
                &[SectionSummary {
                    unit_number: 1,
                    summary: "gone soon".to_string(),
                }],
                "gone soon",
            )
            .unwrap();

        assert!(store.delete_document("ody").unwrap());
        assert!(!store.document_exists("ody").unwrap());
        assert_eq!(store.get_document_summary("ody").unwrap(), None);
        assert!(store.get_all_section_summaries("ody").unwrap().is_empty());
        // Deleting again reports nothing removed
        assert!(!store.delete_document("ody").unwrap());
    }

    #[test]
    fn test_list_documents_ordered() {
        let mut store = store();
        store.upsert_document(&new_doc("zzz", "Last")).unwrap();
        store.upsert_document(&new_doc("aaa", "First")).unwrap();
        let docs = store.list_documents().unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].slug, "aaa");
        assert_eq!(docs[1].slug, "zzz");
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta").join("docdex.db");
        let mut store = MetaStore::open(&path).unwrap();
        store.init().unwrap();
        store.upsert_document(&new_doc("ody", "The Odyssey")).unwrap();
        drop(store);

        let store = MetaStore::open(&path).unwrap();
        assert!(store.document_exists("ody").unwrap());
        assert_eq!(store.path().unwrap(), path);
    }
}
