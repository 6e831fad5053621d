//! Format-specific document parsers (C2).
//!
//! Each parser reads a byte source, decomposes it into structural units
//! (chapter / scene / turn / section) and converts those units into
//! token-budgeted chunks. Parsing extracts only reliable, concrete
//! structure; interpretation is left to retrieval time.

mod book;
mod conversation;
mod report;
mod script;
mod techdoc;

pub use book::BookParser;
pub use conversation::ConversationParser;
pub use report::ReportParser;
pub use script::ScriptParser;
pub use techdoc::TechDocParser;

use crate::chunk::{Chunk, ChunkParams};
use crate::error::{ParserError, Result};
use crate::token::TokenCodec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    /// Prose book (chapter structure).
    Book,
    /// Movie script (scene structure).
    Script,
    /// Transcribed conversation (speaker turns).
    Conversation,
    /// Technical documentation (headed sections).
    TechDoc,
    /// Structured report (canonical sections).
    Report,
}

impl DocType {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Script => "script",
            Self::Conversation => "conversation",
            Self::TechDoc => "tech_doc",
            Self::Report => "report",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = ParserError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "book" => Ok(Self::Book),
            "script" => Ok(Self::Script),
            "conversation" => Ok(Self::Conversation),
            "tech_doc" | "techdoc" => Ok(Self::TechDoc),
            "report" => Ok(Self::Report),
            other => Err(ParserError::UnknownDocType {
                name: other.to_string(),
            }),
        }
    }
}

/// A parser-emitted semantic boundary.
///
/// Units are ephemeral: they exist only between parse and chunk and are
/// never persisted. Numbering is 1-based in reading order, dense after
/// dropped fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralUnit {
    /// Book chapter.
    Chapter {
        /// 1-based chapter number.
        number: u32,
        /// First line of the chapter, truncated to 100 chars.
        title: String,
        /// Chapter body.
        text: String,
    },
    /// Script scene.
    Scene {
        /// 1-based scene number.
        number: u32,
        /// Full heading line, kept verbatim.
        heading: String,
        /// Scene body between two headings.
        text: String,
    },
    /// Conversation turn.
    Turn {
        /// 1-based turn number in emission order.
        number: u32,
        /// Speaker name, trimmed.
        speaker: String,
        /// Clock timestamp if the turn prefix carried one.
        timestamp: Option<String>,
        /// Turn text including continuation lines.
        text: String,
    },
    /// Tech-doc section.
    Section {
        /// 1-based section number (used in chunk ids).
        number: u32,
        /// Section label as written in the source ("3", "3.2", ...).
        label: String,
        /// Heading text.
        heading: String,
        /// Markdown heading level, when parsed from markdown.
        level: Option<u8>,
        /// Code-block heuristic.
        has_code: bool,
        /// Table heuristic.
        has_table: bool,
        /// Section body.
        text: String,
    },
    /// Report section.
    ReportSection {
        /// 1-based section number.
        number: u32,
        /// Canonical type ("executive_summary", "findings", ...).
        section_type: String,
        /// Heading line as written.
        heading: String,
        /// Table heuristic.
        has_table: bool,
        /// Section body.
        text: String,
    },
}

impl StructuralUnit {
    /// The unit's 1-based number.
    #[must_use]
    pub const fn number(&self) -> u32 {
        match self {
            Self::Chapter { number, .. }
            | Self::Scene { number, .. }
            | Self::Turn { number, .. }
            | Self::Section { number, .. }
            | Self::ReportSection { number, .. } => *number,
        }
    }

    /// The unit's raw text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Chapter { text, .. }
            | Self::Scene { text, .. }
            | Self::Turn { text, .. }
            | Self::Section { text, .. }
            | Self::ReportSection { text, .. } => text,
        }
    }
}

/// Contract implemented by every format parser.
pub trait DocumentParser: Send + Sync {
    /// The document type this parser handles.
    fn doc_type(&self) -> DocType;

    /// Reads the raw source with tolerant decoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is missing or unreadable.
    fn read(&self) -> Result<String>;

    /// Deterministically decomposes the source into structural units.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn parse(&self) -> Result<Vec<StructuralUnit>>;

    /// Converts structural units into token-budgeted chunks.
    ///
    /// # Errors
    ///
    /// Returns an error on token-codec failure or invalid parameters.
    fn chunk(
        &self,
        units: &[StructuralUnit],
        codec: &TokenCodec,
        params: &ChunkParams,
    ) -> Result<Vec<Chunk>>;

    /// Extracts document-level descriptors for the metadata record.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn extract_metadata(&self) -> Result<serde_json::Value>;
}

/// Creates the parser for a document type.
///
/// # Errors
///
/// Returns an error for a malformed split pattern.
pub fn parser_for(
    doc_type: DocType,
    path: &Path,
    slug: &str,
    split_pattern: Option<&str>,
) -> Result<Box<dyn DocumentParser>> {
    let path = path.to_path_buf();
    let slug = slug.to_string();
    Ok(match doc_type {
        DocType::Book => Box::new(BookParser::new(path, slug, split_pattern)?),
        DocType::Script => Box::new(ScriptParser::new(path, slug)),
        DocType::Conversation => Box::new(ConversationParser::new(path, slug)?),
        DocType::TechDoc => Box::new(TechDocParser::new(path, slug)),
        DocType::Report => Box::new(ReportParser::new(path, slug)),
    })
}

/// Source file extension, lowercased, with leading dot ("" when absent).
pub(crate) fn source_format(path: &PathBuf) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_type_roundtrip() {
        for (name, ty) in [
            ("book", DocType::Book),
            ("script", DocType::Script),
            ("conversation", DocType::Conversation),
            ("tech_doc", DocType::TechDoc),
            ("report", DocType::Report),
        ] {
            assert_eq!(name.parse::<DocType>().unwrap(), ty);
            assert_eq!(ty.as_str(), name);
        }
    }

    #[test]
    fn test_doc_type_unknown() {
        assert!("poem".parse::<DocType>().is_err());
    }

    #[test]
    fn test_doc_type_serde() {
        let json = serde_json::to_string(&DocType::TechDoc).unwrap();
        assert_eq!(json, "\"tech_doc\"");
        let back: DocType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DocType::TechDoc);
    }

    #[test]
    fn test_unit_accessors() {
        let unit = StructuralUnit::Scene {
            number: 4,
            heading: "INT. CAFE - DAY".to_string(),
            text: "Alice sits.".to_string(),
        };
        assert_eq!(unit.number(), 4);
        assert_eq!(unit.text(), "Alice sits.");
    }

    #[test]
    fn test_source_format() {
        assert_eq!(source_format(&PathBuf::from("a/b/doc.TXT")), ".txt");
        assert_eq!(source_format(&PathBuf::from("a/b/doc.pdf")), ".pdf");
        assert_eq!(source_format(&PathBuf::from("a/b/doc")), "");
    }
}
