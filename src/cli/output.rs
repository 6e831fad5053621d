//! Output formatting for CLI results.

use crate::error::Error;
use crate::ingest::IngestReport;
use crate::query::SearchResponse;
use crate::store::DocumentRecord;
use std::fmt::Write;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl OutputFormat {
    /// Parses a format name; anything unrecognized falls back to text.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

/// Formats an error for the chosen output format.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::json!({ "error": error.to_string() }).to_string()
        }
        OutputFormat::Text => error.to_string(),
    }
}

/// Formats an ingest report.
#[must_use]
pub fn format_ingest_report(report: &IngestReport, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => format!(
            "Ingested '{}' (doc id {})\n  chunks: {}\n  sections: {}\n  lexical index size: {}\n  vector upserts: {}\n",
            report.slug,
            report.doc_id,
            report.num_chunks,
            report.num_sections,
            report.lexical_indexed,
            report.vector_indexed,
        ),
    }
}

/// Formats a search response.
#[must_use]
pub fn format_search_response(response: &SearchResponse, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Text => {
            let mut out = String::new();
            if let Some(error) = &response.error {
                let _ = writeln!(out, "Search failed for '{}': {error}", response.query);
                return out;
            }
            let _ = writeln!(
                out,
                "{} result(s) for '{}' in {}",
                response.num_results, response.query, response.document
            );
            for (i, chunk) in response.chunks.iter().enumerate() {
                let _ = writeln!(out, "\n[{}] {}\n{}", i + 1, chunk.id, chunk.text);
            }
            out
        }
    }
}

/// Formats the document listing.
#[must_use]
pub fn format_documents(documents: &[DocumentRecord], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(documents).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Text => {
            if documents.is_empty() {
                return "No documents ingested.\n".to_string();
            }
            let mut out = String::new();
            let _ = writeln!(out, "{:<22} {:<12} {:>8} {:>10}  TITLE", "SLUG", "TYPE", "CHUNKS", "CHARS");
            for doc in documents {
                let _ = writeln!(
                    out,
                    "{:<22} {:<12} {:>8} {:>10}  {}",
                    doc.slug,
                    doc.doc_type.as_str(),
                    doc.num_chunks,
                    doc.num_chars,
                    doc.title
                );
            }
            out
        }
    }
}

/// Formats a document summary with optional sections.
#[must_use]
pub fn format_summary(
    slug: &str,
    document_summary: Option<&str>,
    sections: Option<&[(u32, String)]>,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({
            "slug": slug,
            "summary": document_summary,
            "sections": sections.map(|s| {
                s.iter()
                    .map(|(unit, summary)| serde_json::json!({"unit": unit, "summary": summary}))
                    .collect::<Vec<_>>()
            }),
        })
        .to_string(),
        OutputFormat::Text => {
            let mut out = String::new();
            match document_summary {
                Some(summary) => {
                    let _ = writeln!(out, "Summary of '{slug}':\n\n{summary}");
                }
                None => {
                    let _ = writeln!(out, "No summary stored for '{slug}'.");
                }
            }
            if let Some(sections) = sections {
                for (unit, summary) in sections {
                    let _ = writeln!(out, "\n--- Section {unit} ---\n{summary}");
                }
            }
            out
        }
    }
}
