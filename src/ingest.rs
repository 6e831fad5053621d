//! Document ingestion pipeline.
//!
//! validate -> parse -> chunk -> summarize -> store -> index -> verify.
//! With `force_update = false` a failing step leaves prior state intact;
//! with `force_update = true` the prior document is removed first, so a
//! late failure leaves a best-effort partial state (logged, accepted).

use crate::chunk::{Chunk, ChunkParams};
use crate::error::{Error, NotFound, ParserError, Result};
use crate::index::{LexicalIndex, VectorIndex};
use crate::parse::{DocType, parser_for};
use crate::store::{MetaStore, NewDocument};
use crate::summarize::{Summarizer, SummaryModel};
use crate::token::TokenCodec;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{info, warn};

/// Slug grammar: short, stable, filesystem- and id-safe.
static SLUG_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = regex::Regex::new(r"^[a-z0-9_-]{2,20}$").unwrap();
    re
});

/// Parameters for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Unique document slug.
    pub slug: String,
    /// Source file path.
    pub path: PathBuf,
    /// Display title.
    pub title: String,
    /// Optional author.
    pub author: Option<String>,
    /// Document type (selects the parser).
    pub doc_type: DocType,
    /// Optional unit-boundary pattern override.
    pub split_pattern: Option<String>,
    /// Optional token-budget override.
    pub max_tokens: Option<usize>,
    /// Optional overlap override.
    pub overlap: Option<usize>,
    /// Overwrite an existing document.
    pub force_update: bool,
}

/// Outcome of a successful ingest.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestReport {
    /// Document slug.
    pub slug: String,
    /// Internal document id.
    pub doc_id: i64,
    /// Chunks produced by the chunker.
    pub num_chunks: usize,
    /// Section summaries generated.
    pub num_sections: usize,
    /// Total chunks in the lexical index after the rebuild.
    pub lexical_indexed: usize,
    /// Chunks upserted into the vector index.
    pub vector_indexed: usize,
}

/// Owned handles the pipeline works over.
///
/// The CLI and tests construct the indexes and store explicitly and
/// thread them through here; there is no global state.
pub struct Pipeline<'a> {
    /// Metadata store.
    pub store: &'a mut MetaStore,
    /// Vector index adapter.
    pub vector: &'a VectorIndex,
    /// Summarization model.
    pub model: &'a dyn SummaryModel,
    /// Token codec shared across stages.
    pub codec: &'a TokenCodec,
    /// Lexical index artifact path (owned by this writer).
    pub lexical_path: PathBuf,
}

impl Pipeline<'_> {
    /// Ingests one document end to end.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error. See the module docs for
    /// the force-update partial-state caveat.
    pub async fn ingest(&mut self, request: &IngestRequest) -> Result<IngestReport> {
        // Validate
        validate_slug(&request.slug)?;
        if !request.path.exists() {
            return Err(crate::error::IoError::FileNotFound {
                path: request.path.to_string_lossy().to_string(),
            }
            .into());
        }
        let existed = self.store.document_exists(&request.slug)?;
        if existed && !request.force_update {
            return Err(Error::Conflict {
                slug: request.slug.clone(),
            });
        }
        info!(slug = %request.slug, doc_type = %request.doc_type, "starting ingest");

        // Parse and chunk
        let parser = parser_for(
            request.doc_type,
            &request.path,
            &request.slug,
            request.split_pattern.as_deref(),
        )?;
        let units = parser.parse()?;
        let mut params = ChunkParams::defaults_for(request.doc_type);
        if let Some(max_tokens) = request.max_tokens {
            params = params.with_max_tokens(max_tokens);
        }
        if let Some(overlap) = request.overlap {
            params = params.with_overlap(overlap);
        }
        let chunks = parser.chunk(&units, self.codec, &params)?;
        if chunks.is_empty() {
            return Err(ParserError::NoContent.into());
        }
        let num_chars: usize = chunks.iter().map(|c| c.text.len()).sum();
        info!(units = units.len(), chunks = chunks.len(), num_chars, "parsed and chunked");

        let doc_metadata = parser.extract_metadata()?;

        // Summarize (bounded-concurrency map-reduce)
        let summarizer = Summarizer::new(self.model, self.codec, request.doc_type);
        let (section_summaries, document_summary) =
            summarizer.summarize_hierarchy(&chunks).await?;
        info!(sections = section_summaries.len(), "summaries generated");

        // Store metadata and summaries
        if existed && request.force_update {
            warn!(slug = %request.slug, "force update: removing prior document state");
            self.store.delete_document(&request.slug)?;
        }
        let doc_id = self.store.upsert_document(&NewDocument {
            slug: &request.slug,
            title: &request.title,
            author: request.author.as_deref(),
            doc_type: request.doc_type,
            num_chunks: chunks.len(),
            num_chars,
            metadata: doc_metadata,
        })?;
        if !section_summaries.is_empty() && !document_summary.is_empty() {
            self.store
                .store_summaries(&request.slug, &section_summaries, &document_summary)?;
        }

        // Build search indexes
        let lexical_indexed = self.rebuild_lexical(&request.slug, &chunks)?;
        if existed && request.force_update {
            self.vector.delete_document(&request.slug).await?;
        }
        let vector_indexed = self.vector.build(&chunks).await?;

        // Verify
        self.verify(&request.slug, section_summaries.len())?;
        info!(slug = %request.slug, doc_id, "ingest complete");

        Ok(IngestReport {
            slug: request.slug.clone(),
            doc_id,
            num_chunks: chunks.len(),
            num_sections: section_summaries.len(),
            lexical_indexed,
            vector_indexed,
        })
    }

    /// Deletes a document from the store and both indexes.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound::Document`] for an unknown identifier.
    pub async fn delete(&mut self, identifier: &str) -> Result<String> {
        let slug = self
            .store
            .resolve_slug(identifier)?
            .ok_or_else(|| NotFound::Document {
                identifier: identifier.to_string(),
            })?;

        self.store.delete_document(&slug)?;

        // Rebuild the lexical index from surviving entries
        let survivors = match LexicalIndex::load(&self.lexical_path) {
            Ok(index) => {
                let prefix = format!("{slug}_");
                index
                    .entries()
                    .filter(|(id, _)| !id.starts_with(prefix.as_str()))
                    .map(|(id, text)| (id.to_string(), text.to_string()))
                    .collect::<Vec<_>>()
            }
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        let mut rebuilt = LexicalIndex::new();
        rebuilt.build(&survivors);
        rebuilt.save(&self.lexical_path)?;

        self.vector.delete_document(&slug).await?;
        info!(slug = %slug, "document deleted");
        Ok(slug)
    }

    /// Rebuilds the lexical index with this document's chunks replacing
    /// any prior chunks under the same slug. Returns the total indexed
    /// count.
    fn rebuild_lexical(&self, slug: &str, chunks: &[Chunk]) -> Result<usize> {
        let mut entries: Vec<(String, String)> = match LexicalIndex::load(&self.lexical_path) {
            Ok(existing) => {
                let prefix = format!("{slug}_");
                existing
                    .entries()
                    .filter(|(id, _)| !id.starts_with(prefix.as_str()))
                    .map(|(id, text)| (id.to_string(), text.to_string()))
                    .collect()
            }
            Err(e) if e.is_not_found() => {
                info!("no existing lexical artifact, creating a new index");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        entries.extend(chunks.iter().map(|c| (c.id.clone(), c.text.clone())));

        let mut index = LexicalIndex::new();
        index.build(&entries);
        index.save(&self.lexical_path)?;
        Ok(index.len())
    }

    /// Post-ingest verification of the promised counts.
    fn verify(&self, slug: &str, expected_sections: usize) -> Result<()> {
        if !self.store.document_exists(slug)? {
            return Err(Error::integrity(format!(
                "document '{slug}' missing after ingest"
            )));
        }
        if expected_sections > 0 && !self.store.summaries_exist(slug)? {
            return Err(Error::integrity(format!(
                "summaries missing for '{slug}' after ingest"
            )));
        }
        let actual = self.store.get_all_section_summaries(slug)?.len();
        if actual != expected_sections {
            return Err(Error::integrity(format!(
                "section count mismatch for '{slug}': expected {expected_sections}, got {actual}"
            )));
        }
        Ok(())
    }
}

/// Validates the slug grammar.
///
/// # Errors
///
/// Returns a validation error for anything outside `^[a-z0-9_-]{2,20}$`.
pub fn validate_slug(slug: &str) -> Result<()> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid slug '{slug}': expected ^[a-z0-9_-]{{2,20}}$"
        )))
    }
}

/// Resolves the lexical artifact path inside a data directory.
#[must_use]
pub fn lexical_artifact_path(data_dir: &Path) -> PathBuf {
    data_dir.join("indexes").join("bm25.idx")
}
