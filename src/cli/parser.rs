//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docdex: multi-format document retrieval core.
///
/// Ingests books, scripts, conversations, tech docs and reports into a
/// hybrid BM25 + vector index with hierarchical summaries.
#[derive(Parser, Debug)]
#[command(name = "docdex")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory for the metadata database and index artifacts.
    ///
    /// Defaults to `.docdex` in the current directory.
    #[arg(long, env = "DOCDEX_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Vector database URL.
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6334", global = true)]
    pub qdrant_url: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolves the data directory.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(".docdex"))
    }

    /// Path of the metadata database inside the data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.resolved_data_dir().join("docdex.db")
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a document: parse, chunk, summarize, index.
    Ingest {
        /// Unique document slug (`[a-z0-9_-]{2,20}`).
        slug: String,

        /// Path to the source file (.txt, .md, .pdf, ...).
        path: PathBuf,

        /// Display title.
        title: String,

        /// Author name.
        #[arg(short, long)]
        author: Option<String>,

        /// Document type (book, script, conversation, tech_doc, report).
        #[arg(short, long, default_value = "book")]
        doc_type: String,

        /// Unit-boundary regex override (e.g. a chapter pattern).
        #[arg(long)]
        split_pattern: Option<String>,

        /// Token budget per chunk (default depends on document type).
        #[arg(long)]
        max_tokens: Option<usize>,

        /// Token overlap between chunks (default depends on document type).
        #[arg(long)]
        overlap: Option<usize>,

        /// Overwrite an existing document with the same slug.
        #[arg(short, long)]
        force: bool,
    },

    /// Search one document with hybrid retrieval.
    Search {
        /// The query.
        query: String,

        /// Document identifier: slug, title or numeric id.
        #[arg(short, long)]
        document: String,

        /// Number of results.
        #[arg(short = 'k', long, default_value = "7")]
        top_k: usize,

        /// Disable query preprocessing (stopword dropping).
        #[arg(long)]
        no_preprocess: bool,

        /// Pick alpha from the query shape instead of the fixed 0.7.
        #[arg(long)]
        dynamic_alpha: bool,

        /// Candidate oversampling multiplier.
        #[arg(long, default_value = "3")]
        multiplier: usize,

        /// Use parameter-free reciprocal-rank fusion.
        #[arg(long)]
        rrf: bool,

        /// Apply the conversation diversifier to conversation documents.
        #[arg(long)]
        diversify: bool,
    },

    /// Delete a document and its chunks from both indexes.
    #[command(name = "delete", alias = "rm")]
    Delete {
        /// Document identifier: slug, title or numeric id.
        identifier: String,

        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show a document's summary.
    Summary {
        /// Document identifier: slug, title or numeric id.
        identifier: String,

        /// Show per-section summaries as well.
        #[arg(short, long)]
        sections: bool,
    },

    /// List ingested documents.
    #[command(name = "list", alias = "ls")]
    List,

    /// Show store and index status.
    Status,
}
