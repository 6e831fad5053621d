//! Tech-doc parser: section-based decomposition for manuals and markdown.
//!
//! Sources containing fenced code markers are treated as Markdown
//! (`##`/`###` headings); otherwise sections are detected from numeric
//! headings with a length guard, as produced by PDF extraction. Sections
//! carry code and table flags computed by heuristic.

use crate::chunk::{Chunk, ChunkMetadata, ChunkParams, split_unit};
use crate::error::Result;
use crate::parse::{DocType, DocumentParser, StructuralUnit, source_format};
use crate::token::TokenCodec;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Markdown heading: `##` or `###` at line start.
static MD_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"^(#{2,3})\s+(.+)$").unwrap();
    re
});

/// Numeric section heading ("3 Title", "3.2 Title").
static NUMERIC_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"^(\d+(?:\.\d+)*)\s+(.+)$").unwrap();
    re
});

/// Fenced code block.
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"(?s)```(\w+)?\n(.*?)```").unwrap();
    re
});

/// Heading lines longer than this are treated as body text.
const MAX_HEADING_CHARS: usize = 100;

/// Keywords that mark a line as code without a fence.
const CODE_KEYWORDS: &[&str] = &[
    "def ", "class ", "function ", "SELECT ", "CREATE ", "INSERT ", "import ", "const ", "let ",
    "var ",
];

/// Parser for section-structured technical documentation.
pub struct TechDocParser {
    path: PathBuf,
    slug: String,
}

/// Intermediate section representation shared by both parse paths.
struct RawSection {
    label: String,
    heading: String,
    level: Option<u8>,
    text: String,
}

impl TechDocParser {
    /// Creates a tech-doc parser.
    #[must_use]
    pub const fn new(path: PathBuf, slug: String) -> Self {
        Self { path, slug }
    }

    fn is_markdown(&self, content: &str) -> bool {
        let md_ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("md"));
        md_ext || content.contains("```")
    }

    fn parse_markdown(content: &str) -> Vec<RawSection> {
        let mut sections: Vec<RawSection> = Vec::new();
        let mut current: Option<(String, u8, Vec<&str>)> = None;

        for line in content.lines() {
            if let Some(caps) = MD_HEADING.captures(line) {
                if let Some((heading, level, lines)) = current.take() {
                    sections.push(RawSection {
                        label: (sections.len() + 1).to_string(),
                        heading,
                        level: Some(level),
                        text: lines.join("\n").trim().to_string(),
                    });
                }
                #[allow(clippy::cast_possible_truncation)]
                let level = caps[1].len() as u8;
                current = Some((caps[2].trim().to_string(), level, Vec::new()));
            } else if let Some((_, _, lines)) = current.as_mut() {
                lines.push(line);
            }
        }

        if let Some((heading, level, lines)) = current {
            sections.push(RawSection {
                label: (sections.len() + 1).to_string(),
                heading,
                level: Some(level),
                text: lines.join("\n").trim().to_string(),
            });
        }

        sections
    }

    fn parse_plain(content: &str) -> Vec<RawSection> {
        let mut sections: Vec<RawSection> = Vec::new();
        let mut current: Option<(String, String, Vec<&str>)> = None;

        for line in content.lines() {
            let stripped = line.trim();
            let heading_match = if stripped.len() < MAX_HEADING_CHARS {
                NUMERIC_HEADING.captures(stripped)
            } else {
                None
            };

            if let Some(caps) = heading_match {
                if let Some((label, heading, lines)) = current.take() {
                    sections.push(RawSection {
                        label,
                        heading,
                        level: None,
                        text: lines.join("\n").trim().to_string(),
                    });
                }
                current = Some((caps[1].to_string(), caps[2].trim().to_string(), Vec::new()));
            } else if let Some((_, _, lines)) = current.as_mut() {
                lines.push(line);
            }
        }

        if let Some((label, heading, lines)) = current {
            sections.push(RawSection {
                label,
                heading,
                level: None,
                text: lines.join("\n").trim().to_string(),
            });
        }

        // No numeric sections: treat the whole source as one section
        if sections.is_empty() && !content.trim().is_empty() {
            sections.push(RawSection {
                label: "1".to_string(),
                heading: "Document".to_string(),
                level: None,
                text: content.to_string(),
            });
        }

        sections
    }

    /// Code-block heuristic: fence presence or a known keyword.
    fn has_code(text: &str) -> bool {
        CODE_FENCE.is_match(text) || CODE_KEYWORDS.iter().any(|kw| text.contains(kw))
    }

    /// Table heuristic: markdown pipes or >= 3 column-aligned lines.
    fn has_table(text: &str) -> bool {
        if text.lines().any(|l| {
            let pipe_count = l.matches('|').count();
            pipe_count >= 2
        }) {
            return true;
        }
        let aligned = text
            .lines()
            .filter(|l| l.matches("  ").count() >= 3 || l.contains('\t'))
            .count();
        aligned >= 3
    }
}

impl DocumentParser for TechDocParser {
    fn doc_type(&self) -> DocType {
        DocType::TechDoc
    }

    fn read(&self) -> Result<String> {
        crate::io::read_source(&self.path)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn parse(&self) -> Result<Vec<StructuralUnit>> {
        let content = self.read()?;

        let raw = if self.is_markdown(&content) {
            Self::parse_markdown(&content)
        } else {
            Self::parse_plain(&content)
        };

        Ok(raw
            .into_iter()
            .enumerate()
            .map(|(i, s)| StructuralUnit::Section {
                number: i as u32 + 1,
                has_code: Self::has_code(&s.text),
                has_table: Self::has_table(&s.text),
                label: s.label,
                heading: s.heading,
                level: s.level,
                text: s.text,
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
            let StructuralUnit::Section {
                number,
                label,
                heading,
                has_code,
                has_table,
                text,
                ..
            } = unit
            else {
                continue;
            };
            let base = ChunkMetadata {
                section: Some(label.clone()),
                heading: Some(heading.clone()),
                has_code: Some(*has_code),
                has_table: Some(*has_table),
                ..ChunkMetadata::default()
            };
            let prefix = format!("## {heading}\n\n");
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
        let mut headings = Vec::new();
        let mut any_code = false;
        let mut any_table = false;
        for unit in &sections {
            if let StructuralUnit::Section {
                heading,
                has_code,
                has_table,
                ..
            } = unit
            {
                if headings.len() < 10 {
                    headings.push(heading.clone());
                }
                any_code |= has_code;
                any_table |= has_table;
            }
        }
        Ok(serde_json::json!({
            "source_format": source_format(&self.path),
            "num_sections": sections.len(),
            "has_code": any_code,
            "has_tables": any_table,
            "section_headings": headings,
        }))
    }
}
