//! CLI command implementations.

#![allow(clippy::too_many_lines)]

use crate::cli::output::{
    OutputFormat, format_documents, format_ingest_report, format_search_response, format_summary,
};
use crate::cli::parser::{Cli, Commands};
use crate::embedding::create_embedder;
use crate::error::{Error, NotFound, Result};
use crate::index::{LexicalIndex, VectorIndex};
use crate::ingest::{IngestRequest, Pipeline, lexical_artifact_path};
use crate::parse::DocType;
use crate::query::{QueryOptions, search_document};
use crate::search::{FusionMethod, SearchOptions};
use crate::store::MetaStore;
use crate::summarize::OpenAiSummaryModel;
use crate::token::TokenCodec;
use std::fmt::Write as FmtWrite;
use std::io::{self, BufRead, Write as IoWrite};
use tracing::warn;

/// Executes the parsed CLI command.
///
/// # Errors
///
/// Returns an error if the command fails; the binary maps it to a
/// non-zero exit code.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Ingest {
            slug,
            path,
            title,
            author,
            doc_type,
            split_pattern,
            max_tokens,
            overlap,
            force,
        } => {
            let request = IngestRequest {
                slug: slug.clone(),
                path: path.clone(),
                title: title.clone(),
                author: author.clone(),
                doc_type: doc_type.parse::<DocType>()?,
                split_pattern: split_pattern.clone(),
                max_tokens: *max_tokens,
                overlap: *overlap,
                force_update: *force,
            };
            cmd_ingest(cli, &request, format).await
        }
        Commands::Search {
            query,
            document,
            top_k,
            no_preprocess,
            dynamic_alpha,
            multiplier,
            rrf,
            diversify,
        } => {
            let mut search = SearchOptions::new()
                .with_top_k(*top_k)
                .with_preprocess(!no_preprocess)
                .with_dynamic_alpha(*dynamic_alpha)
                .with_candidate_multiplier(*multiplier);
            if *rrf {
                search = search.with_fusion(FusionMethod::Rrf);
            }
            let options = QueryOptions {
                search,
                diversify: *diversify,
            };
            cmd_search(cli, query, document, &options, format).await
        }
        Commands::Delete { identifier, yes } => cmd_delete(cli, identifier, *yes, format).await,
        Commands::Summary {
            identifier,
            sections,
        } => cmd_summary(cli, identifier, *sections, format),
        Commands::List => cmd_list(cli, format),
        Commands::Status => cmd_status(cli, format),
    }
}

fn open_store(cli: &Cli) -> Result<MetaStore> {
    let mut store = MetaStore::open(cli.db_path())?;
    store.init()?;
    Ok(store)
}

fn connect_vector(cli: &Cli) -> Result<VectorIndex> {
    VectorIndex::connect(&cli.qdrant_url, create_embedder()?)
}

/// Loads the lexical index, treating a missing artifact as absent.
fn load_lexical(cli: &Cli) -> Result<Option<LexicalIndex>> {
    let path = lexical_artifact_path(&cli.resolved_data_dir());
    match LexicalIndex::load(&path) {
        Ok(index) => Ok(Some(index)),
        Err(e) if e.is_not_found() => {
            warn!(path = %path.display(), "lexical index artifact not found, degrading to vector-only");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn cmd_ingest(cli: &Cli, request: &IngestRequest, format: OutputFormat) -> Result<String> {
    let mut store = open_store(cli)?;
    let vector = connect_vector(cli)?;
    let model = OpenAiSummaryModel::from_env();
    let codec = TokenCodec::new()?;

    let mut pipeline = Pipeline {
        store: &mut store,
        vector: &vector,
        model: &model,
        codec: &codec,
        lexical_path: lexical_artifact_path(&cli.resolved_data_dir()),
    };
    let report = pipeline.ingest(request).await?;
    Ok(format_ingest_report(&report, format))
}

async fn cmd_search(
    cli: &Cli,
    query: &str,
    document: &str,
    options: &QueryOptions,
    format: OutputFormat,
) -> Result<String> {
    let store = open_store(cli)?;
    let lexical = load_lexical(cli)?;
    let vector = connect_vector(cli)?;

    let response = search_document(
        &store,
        lexical.as_ref(),
        Some(&vector),
        query,
        document,
        options,
    )
    .await;
    Ok(format_search_response(&response, format))
}

async fn cmd_delete(
    cli: &Cli,
    identifier: &str,
    yes: bool,
    format: OutputFormat,
) -> Result<String> {
    let mut store = open_store(cli)?;
    if store.resolve_slug(identifier)?.is_none() {
        return Err(NotFound::Document {
            identifier: identifier.to_string(),
        }
        .into());
    }

    if !yes && !confirm(&format!("Delete document '{identifier}' and all its chunks?"))? {
        return Ok("Aborted.\n".to_string());
    }

    let vector = connect_vector(cli)?;
    let model = OpenAiSummaryModel::from_env();
    let codec = TokenCodec::new()?;
    let mut pipeline = Pipeline {
        store: &mut store,
        vector: &vector,
        model: &model,
        codec: &codec,
        lexical_path: lexical_artifact_path(&cli.resolved_data_dir()),
    };
    let slug = pipeline.delete(identifier).await?;

    Ok(match format {
        OutputFormat::Json => serde_json::json!({ "deleted": slug }).to_string(),
        OutputFormat::Text => format!("Deleted '{slug}'.\n"),
    })
}

fn cmd_summary(
    cli: &Cli,
    identifier: &str,
    include_sections: bool,
    format: OutputFormat,
) -> Result<String> {
    let store = open_store(cli)?;
    let slug = store
        .resolve_slug(identifier)?
        .ok_or_else(|| NotFound::Document {
            identifier: identifier.to_string(),
        })?;

    let document_summary = store.get_document_summary(&slug)?;
    let sections = if include_sections {
        Some(store.get_all_section_summaries(&slug)?)
    } else {
        None
    };

    Ok(format_summary(
        &slug,
        document_summary.as_deref(),
        sections.as_deref(),
        format,
    ))
}

fn cmd_list(cli: &Cli, format: OutputFormat) -> Result<String> {
    let store = open_store(cli)?;
    let documents = store.list_documents()?;
    Ok(format_documents(&documents, format))
}

fn cmd_status(cli: &Cli, format: OutputFormat) -> Result<String> {
    let store = open_store(cli)?;
    let documents = store.list_documents()?;
    let artifact = lexical_artifact_path(&cli.resolved_data_dir());
    let lexical_chunks = match LexicalIndex::load(&artifact) {
        Ok(index) => Some(index.len()),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e),
    };

    match format {
        OutputFormat::Json => Ok(serde_json::json!({
            "db_path": cli.db_path(),
            "documents": documents.len(),
            "lexical_artifact": artifact,
            "lexical_chunks": lexical_chunks,
            "qdrant_url": cli.qdrant_url,
        })
        .to_string()),
        OutputFormat::Text => {
            let mut out = String::new();
            let _ = writeln!(out, "Database:        {}", cli.db_path().display());
            let _ = writeln!(out, "Documents:       {}", documents.len());
            match lexical_chunks {
                Some(count) => {
                    let _ = writeln!(out, "Lexical index:   {count} chunks ({})", artifact.display());
                }
                None => {
                    let _ = writeln!(out, "Lexical index:   absent ({})", artifact.display());
                }
            }
            let _ = writeln!(out, "Vector backend:  {}", cli.qdrant_url);
            Ok(out)
        }
    }
}

/// Prompts for confirmation on stdin.
fn confirm(message: &str) -> Result<bool> {
    #[allow(clippy::print_stderr)]
    {
        eprint!("{message} [y/N] ");
    }
    io::stderr().flush().map_err(Error::from)?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(Error::from)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli_for(dir: &std::path::Path, args: &[&str]) -> Cli {
        let data_dir = dir.to_string_lossy().to_string();
        let mut full = vec!["docdex", "--data-dir", data_dir.as_str()];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_cmd_list_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_for(dir.path(), &["list"]);
        let out = cmd_list(&cli, OutputFormat::Text).unwrap();
        assert!(out.contains("No documents"));
    }

    #[test]
    fn test_cmd_status_reports_absent_index() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_for(dir.path(), &["status"]);
        let out = cmd_status(&cli, OutputFormat::Text).unwrap();
        assert!(out.contains("Documents:       0"));
        assert!(out.contains("absent"));
    }

    #[test]
    fn test_cmd_summary_unknown_document() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_for(dir.path(), &["summary", "ghost"]);
        let err = cmd_summary(&cli, "ghost", false, OutputFormat::Text).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_lexical_absent_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cli = cli_for(dir.path(), &["status"]);
        assert!(load_lexical(&cli).unwrap().is_none());
    }
}
