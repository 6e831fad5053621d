//! Book parser: chapter-based decomposition for novels and textbooks.
//!
//! Strips Gutenberg-style prelude/epilogue markers, splits on a chapter
//! pattern (Roman or Arabic numeral headings by default), and chunks
//! chapters with token overlap.

use crate::chunk::{Chunk, ChunkMetadata, ChunkParams, split_unit};
use crate::error::Result;
use crate::parse::{DocType, DocumentParser, StructuralUnit, source_format};
use crate::token::TokenCodec;
use regex::{Regex, RegexBuilder};
use std::path::PathBuf;
use tracing::debug;

/// Default chapter pattern: Roman or Arabic numeral headings at line start.
const DEFAULT_CHAPTER_PATTERN: &str = r"^(?:CHAPTER [IVXLCDM]+\.?|Chapter \d+)\s*\n";

/// Residue shorter than this, sitting before the first chapter heading,
/// is dropped as front-matter (title pages, tables of contents).
const MIN_CHAPTER_CHARS: usize = 100;

/// Parser for chapter-structured prose.
pub struct BookParser {
    path: PathBuf,
    slug: String,
    pattern: String,
    splitter: Regex,
}

impl BookParser {
    /// Creates a book parser.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `split_pattern`.
    pub fn new(path: PathBuf, slug: String, split_pattern: Option<&str>) -> Result<Self> {
        let pattern = split_pattern.unwrap_or(DEFAULT_CHAPTER_PATTERN).to_string();
        let splitter = RegexBuilder::new(&pattern)
            .multi_line(true)
            .case_insensitive(true)
            .build()
            .map_err(crate::error::ParserError::from)?;
        Ok(Self {
            path,
            slug,
            pattern,
            splitter,
        })
    }

    /// Removes Gutenberg header/footer boilerplate when both markers are
    /// present.
    fn strip_gutenberg(text: &str) -> &str {
        let start = Regex::new(r"\*\*\* START OF.*\*\*\*")
            .ok()
            .and_then(|re| re.find(text));
        let end = Regex::new(r"\*\*\* END OF.*\*\*\*")
            .ok()
            .and_then(|re| re.find(text));

        match (start, end) {
            (Some(s), Some(e)) if s.end() <= e.start() => text[s.end()..e.start()].trim(),
            _ => text,
        }
    }
}

impl DocumentParser for BookParser {
    fn doc_type(&self) -> DocType {
        DocType::Book
    }

    fn read(&self) -> Result<String> {
        let raw = crate::io::read_source(&self.path)?;
        Ok(Self::strip_gutenberg(&raw).to_string())
    }

    fn parse(&self) -> Result<Vec<StructuralUnit>> {
        let content = self.read()?;

        let spans: Vec<(usize, usize)> = self
            .splitter
            .find_iter(&content)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut bodies: Vec<&str> = Vec::new();
        if spans.is_empty() {
            // No headings: the whole source is one chapter, subject to the floor
            let body = content.trim();
            if body.len() >= MIN_CHAPTER_CHARS {
                bodies.push(body);
            } else if !body.is_empty() {
                debug!(slug = %self.slug, len = body.len(), "dropping short unheaded source");
            }
        } else {
            let preamble = content[..spans[0].0].trim();
            if preamble.len() >= MIN_CHAPTER_CHARS {
                bodies.push(preamble);
            } else if !preamble.is_empty() {
                debug!(slug = %self.slug, len = preamble.len(), "dropping front-matter fragment");
            }
            for (i, (_, end)) in spans.iter().enumerate() {
                let next_start = spans.get(i + 1).map_or(content.len(), |(s, _)| *s);
                let body = content[*end..next_start].trim();
                if !body.is_empty() {
                    bodies.push(body);
                }
            }
        }

        let chapters = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| {
                let title: String = body
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .chars()
                    .take(100)
                    .collect();
                StructuralUnit::Chapter {
                    number: u32::try_from(i + 1).unwrap_or(u32::MAX),
                    title,
                    text: body.to_string(),
                }
            })
            .collect();

        Ok(chapters)
    }

    fn chunk(
        &self,
        units: &[StructuralUnit],
        codec: &TokenCodec,
        params: &ChunkParams,
    ) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for unit in units {
            let StructuralUnit::Chapter {
                number,
                title,
                text,
            } = unit
            else {
                continue;
            };
            let base = ChunkMetadata {
                chapter: Some(*number),
                chapter_title: Some(title.clone()),
                ..ChunkMetadata::default()
            };
            chunks.extend(split_unit(
                codec, &self.slug, *number, text, None, params, &base, false,
            )?);
        }
        Ok(chunks)
    }

    fn extract_metadata(&self) -> Result<serde_json::Value> {
        let content = self.read()?;
        Ok(serde_json::json!({
            "source_format": source_format(&self.path),
            "total_chars": content.len(),
            "total_words": content.split_whitespace().count(),
            "split_pattern": self.pattern,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    fn chapter_body(tag: &str) -> String {
        format!("{tag} {}", "filler prose that comfortably clears the length floor. ".repeat(4))
    }

    #[test]
    fn test_strip_gutenberg() {
        let text = "header junk\n*** START OF THE BOOK ***\nreal content\n*** END OF THE BOOK ***\nfooter";
        assert_eq!(BookParser::strip_gutenberg(text), "real content");
    }

    #[test]
    fn test_strip_gutenberg_absent_markers() {
        let text = "no markers here";
        assert_eq!(BookParser::strip_gutenberg(text), text);
    }

    #[test]
    fn test_parse_chapters_default_pattern() {
        let content = format!(
            "CHAPTER I.\n{}\nCHAPTER II.\n{}\n",
            chapter_body("First chapter."),
            chapter_body("Second chapter.")
        );
        let (_dir, path) = write_temp(&content);
        let parser = BookParser::new(path, "bok".to_string(), None).unwrap();
        let units = parser.parse().unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].number(), 1);
        assert_eq!(units[1].number(), 2);
        match &units[0] {
            StructuralUnit::Chapter { title, .. } => {
                assert!(title.starts_with("First chapter."));
            }
            other => panic!("unexpected unit: {other:?}"),
        }
    }

    #[test]
    fn test_parse_custom_pattern() {
        let content = format!(
            "*** START OF X ***\nBOOK I\n{}\nBOOK II\n{}\n*** END OF X ***",
            chapter_body("Sing, muse."),
            chapter_body("Telemachus rises.")
        );
        let (_dir, path) = write_temp(&content);
        let parser =
            BookParser::new(path, "ody".to_string(), Some(r"^BOOK [IVXLCDM]+\s*\n")).unwrap();
        let units = parser.parse().unwrap();
        assert_eq!(units.len(), 2);
    }

    #[test]
    fn test_front_matter_dropped_numbering_dense() {
        let content = format!(
            "Title Page\nCHAPTER I.\n{}\nCHAPTER II.\n{}\n",
            chapter_body("First."),
            chapter_body("Second.")
        );
        let (_dir, path) = write_temp(&content);
        let parser = BookParser::new(path, "bok".to_string(), None).unwrap();
        let units = parser.parse().unwrap();
        // The front-matter fragment is dropped and numbering stays dense from 1
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].number(), 1);
        match &units[0] {
            StructuralUnit::Chapter { title, .. } => assert!(title.starts_with("First.")),
            other => panic!("unexpected unit: {other:?}"),
        }
    }

    #[test]
    fn test_smoke_two_chapters_minimal_bodies() {
        let content = "*** START OF X ***\nCHAPTER I.\nAlpha beta gamma.\nCHAPTER II.\nDelta epsilon.\n*** END OF X ***";
        let (_dir, path) = write_temp(content);
        let parser =
            BookParser::new(path, "tst".to_string(), Some(r"^CHAPTER [IVX]+\.")).unwrap();
        let units = parser.parse().unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text(), "Alpha beta gamma.");
        assert_eq!(units[1].text(), "Delta epsilon.");
    }

    #[test]
    fn test_parse_empty_source() {
        let (_dir, path) = write_temp("");
        let parser = BookParser::new(path, "bok".to_string(), None).unwrap();
        assert!(parser.parse().unwrap().is_empty());
    }

    #[test]
    fn test_chunk_ids_carry_chapter_numbers() {
        let content = format!(
            "CHAPTER I.\n{}\nCHAPTER II.\n{}\n",
            chapter_body("Alpha."),
            chapter_body("Beta.")
        );
        let (_dir, path) = write_temp(&content);
        let parser = BookParser::new(path, "tst".to_string(), None).unwrap();
        let codec = TokenCodec::new().unwrap();
        let units = parser.parse().unwrap();
        let chunks = parser
            .chunk(&units, &codec, &ChunkParams::defaults_for(DocType::Book))
            .unwrap();
        assert_eq!(chunks.len(), 2);
        let re = regex::Regex::new(r"^tst_0[12]_001_[0-9a-f]{7}$").unwrap();
        for chunk in &chunks {
            assert!(re.is_match(&chunk.id), "id: {}", chunk.id);
        }
        assert_eq!(chunks[0].metadata.chapter, Some(1));
        assert_eq!(chunks[1].metadata.chapter, Some(2));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let (_dir, path) = write_temp("content");
        let result = BookParser::new(path, "bok".to_string(), Some("[broken"));
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_metadata() {
        let content = format!("CHAPTER I.\n{}\n", chapter_body("Words."));
        let (_dir, path) = write_temp(&content);
        let parser = BookParser::new(path, "bok".to_string(), None).unwrap();
        let meta = parser.extract_metadata().unwrap();
        assert_eq!(meta["source_format"], ".txt");
        assert!(meta["total_words"].as_u64().unwrap() > 10);
        assert!(meta["split_pattern"].as_str().unwrap().contains("CHAPTER"));
    }
}
