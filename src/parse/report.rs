//! Report parser: canonical-section decomposition for business reports
//! and whitepapers.
//!
//! Sections are introduced by a closed set of headings (Executive
//! Summary, Methods, Findings, ...) matched case-insensitively on short
//! lines. A source with no recognized heading becomes one
//! `full_document` section.

use crate::chunk::{Chunk, ChunkMetadata, ChunkParams, split_unit};
use crate::error::Result;
use crate::parse::{DocType, DocumentParser, StructuralUnit, source_format};
use crate::token::TokenCodec;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Canonical report section keywords, matched case-insensitively.
const SECTION_KEYWORDS: &[&str] = &[
    "executive summary",
    "introduction",
    "background",
    "methodology",
    "methods",
    "approach",
    "results",
    "findings",
    "analysis",
    "discussion",
    "conclusion",
    "recommendations",
    "appendix",
    "references",
];

/// Heading lines longer than this are treated as body text.
const MAX_HEADING_CHARS: usize = 100;

/// Runs of aligned numbers, a table tell in extracted PDFs.
static ALIGNED_NUMBERS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(\d+\s+){3,}").unwrap();
    re
});

/// Parser for canonical-section reports.
pub struct ReportParser {
    path: PathBuf,
    slug: String,
}

impl ReportParser {
    /// Creates a report parser.
    #[must_use]
    pub const fn new(path: PathBuf, slug: String) -> Self {
        Self { path, slug }
    }

    /// Returns the canonical type when `line` is a recognized heading.
    fn heading_type(line: &str) -> Option<String> {
        if line.len() >= MAX_HEADING_CHARS {
            return None;
        }
        let lower = line.to_lowercase();
        SECTION_KEYWORDS
            .iter()
            .find(|kw| lower.contains(*kw))
            .map(|kw| kw.replace(' ', "_"))
    }

    /// Table heuristic: column-aligned lines or runs of aligned numbers.
    fn has_table(text: &str) -> bool {
        let aligned = text
            .lines()
            .filter(|l| l.matches("  ").count() >= 3 || l.contains('\t'))
            .count();
        aligned >= 3 || ALIGNED_NUMBERS.is_match(text)
    }
}

impl DocumentParser for ReportParser {
    fn doc_type(&self) -> DocType {
        DocType::Report
    }

    fn read(&self) -> Result<String> {
        crate::io::read_source(&self.path)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn parse(&self) -> Result<Vec<StructuralUnit>> {
        let content = self.read()?;

        let mut sections: Vec<(String, String, String)> = Vec::new();
        let mut current: Option<(String, String, Vec<&str>)> = None;

        for line in content.lines() {
            let stripped = line.trim();

            if let Some(section_type) = Self::heading_type(stripped) {
                if let Some((ty, heading, lines)) = current.take() {
                    let text = lines.join("\n").trim().to_string();
                    if !text.is_empty() {
                        sections.push((ty, heading, text));
                    }
                }
                current = Some((section_type, stripped.to_string(), Vec::new()));
            } else if let Some((_, _, lines)) = current.as_mut() {
                lines.push(line);
            }
        }

        if let Some((ty, heading, lines)) = current {
            let text = lines.join("\n").trim().to_string();
            if !text.is_empty() {
                sections.push((ty, heading, text));
            }
        }

        // No recognized headings: the whole report is one section
        if sections.is_empty() && !content.trim().is_empty() {
            sections.push((
                "full_document".to_string(),
                "Full Report".to_string(),
                content.clone(),
            ));
        }

        Ok(sections
            .into_iter()
            .enumerate()
            .map(|(i, (section_type, heading, text))| StructuralUnit::ReportSection {
                number: i as u32 + 1,
                has_table: Self::has_table(&text),
                section_type,
                heading,
                text,
            })
            .collect())
    }

    fn chunk(
        &self,
        units: &[StructuralUnit],
        codec: &TokenCodec,
        params: &ChunkParams,
    ) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for unit in units {
            let StructuralUnit::ReportSection {
                number,
                section_type,
                heading,
                has_table,
                text,
            } = unit
            else {
                continue;
            };
            let base = ChunkMetadata {
                section_type: Some(section_type.clone()),
                heading: Some(heading.clone()),
                has_table: Some(*has_table),
                ..ChunkMetadata::default()
            };
            let prefix = format!("{heading}\n\n");
            chunks.extend(split_unit(
                codec,
                &self.slug,
                *number,
                text,
                Some(&prefix),
                params,
                &base,
                true,
            )?);
        }
        Ok(chunks)
    }

    fn extract_metadata(&self) -> Result<serde_json::Value> {
        let sections = self.parse()?;
        let mut section_types: Vec<String> = Vec::new();
        let mut any_table = false;
        for unit in &sections {
            if let StructuralUnit::ReportSection {
                section_type,
                has_table,
                ..
            } = unit
            {
                if !section_types.contains(section_type) {
                    section_types.push(section_type.clone());
                }
                any_table |= has_table;
            }
        }
        let has_executive_summary = section_types.iter().any(|t| t == "executive_summary");
        Ok(serde_json::json!({
            "source_format": source_format(&self.path),
            "num_sections": sections.len(),
            "section_types": section_types,
            "has_executive_summary": has_executive_summary,
            "has_tables": any_table,
        }))
    }
}
