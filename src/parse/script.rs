//! Script parser: scene-based decomposition for screenplays.
//!
//! Only bulletproof structure is extracted: scene boundaries and verbatim
//! heading text. Location, time and character attribution stay inside the
//! text for retrieval time.

use crate::chunk::{Chunk, ChunkMetadata, ChunkParams, split_unit};
use crate::error::Result;
use crate::parse::{DocType, DocumentParser, StructuralUnit, source_format};
use crate::token::TokenCodec;
use regex::{Regex, RegexBuilder};
use std::path::PathBuf;
use std::sync::LazyLock;

/// Scene heading pattern: INT., EXT., INT/EXT., I/E., INT, EXT (any case).
static SCENE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    let re = RegexBuilder::new(r"^(INT\.|EXT\.|INT/EXT\.|I/E\.|INT |EXT )(.*)$")
        .case_insensitive(true)
        .build()
        .unwrap();
    re
});

/// Parser for scene-structured screenplays.
pub struct ScriptParser {
    path: PathBuf,
    slug: String,
}

impl ScriptParser {
    /// Creates a script parser.
    #[must_use]
    pub const fn new(path: PathBuf, slug: String) -> Self {
        Self { path, slug }
    }
}

impl DocumentParser for ScriptParser {
    fn doc_type(&self) -> DocType {
        DocType::Script
    }

    fn read(&self) -> Result<String> {
        crate::io::read_source(&self.path)
    }

    fn parse(&self) -> Result<Vec<StructuralUnit>> {
        let content = self.read()?;

        let mut scenes = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in content.lines() {
            let stripped = line.trim();

            if SCENE_PATTERN.is_match(stripped) {
                if let Some((heading, lines)) = current.take() {
                    let text = lines.join("\n").trim().to_string();
                    if !text.is_empty() {
                        push_scene(&mut scenes, heading, text);
                    }
                }
                current = Some((stripped.to_string(), Vec::new()));
                continue;
            }

            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }

        if let Some((heading, lines)) = current {
            let text = lines.join("\n").trim().to_string();
            if !text.is_empty() {
                push_scene(&mut scenes, heading, text);
            }
        }

        Ok(scenes)
    }

    fn chunk(
        &self,
        units: &[StructuralUnit],
        codec: &TokenCodec,
        params: &ChunkParams,
    ) -> Result<Vec<Chunk>> {
        let mut chunks = Vec::new();
        for unit in units {
            let StructuralUnit::Scene {
                number,
                heading,
                text,
            } = unit
            else {
                continue;
            };
            // One chunk per scene: heading + content, token-split only when
            // a scene exceeds the budget
            let composed = format!("SCENE {number}: {heading}\n\n{text}");
            let base = ChunkMetadata {
                scene_number: Some(*number),
                heading: Some(heading.clone()),
                ..ChunkMetadata::default()
            };
            chunks.extend(split_unit(
                codec, &self.slug, *number, &composed, None, params, &base, false,
            )?);
        }
        Ok(chunks)
    }

    fn extract_metadata(&self) -> Result<serde_json::Value> {
        let scenes = self.parse()?;
        let headings: Vec<&str> = scenes
            .iter()
            .take(10)
            .filter_map(|s| match s {
                StructuralUnit::Scene { heading, .. } => Some(heading.as_str()),
                _ => None,
            })
            .collect();
        Ok(serde_json::json!({
            "source_format": source_format(&self.path),
            "num_scenes": scenes.len(),
            "scene_headings": headings,
        }))
    }
}

#[allow(clippy::cast_possible_truncation)]
fn push_scene(scenes: &mut Vec<StructuralUnit>, heading: String, text: String) {
    scenes.push(StructuralUnit::Scene {
        number: scenes.len() as u32 + 1,
        heading,
        text,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
FADE IN:

INT. CAFE - DAY

Alice sits at a corner table, stirring cold coffee.

ALICE
(whispering)
He's late again.

EXT. STREET - NIGHT

Rain. Bob runs, coat over his head.

i/e. CAR - CONTINUOUS

Bob fumbles with the keys.
";

    fn write_temp(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.txt");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_parse_scene_boundaries() {
        let (_dir, path) = write_temp(SAMPLE);
        let parser = ScriptParser::new(path, "mov".to_string());
        let units = parser.parse().unwrap();
        assert_eq!(units.len(), 3);

        match &units[0] {
            StructuralUnit::Scene {
                number,
                heading,
                text,
            } => {
                assert_eq!(*number, 1);
                assert_eq!(heading, "INT. CAFE - DAY");
                assert!(text.contains("He's late again."));
            }
            other => panic!("unexpected unit: {other:?}"),
        }
    }

    #[test]
    fn test_heading_kept_verbatim_case_insensitive_match() {
        let (_dir, path) = write_temp(SAMPLE);
        let parser = ScriptParser::new(path, "mov".to_string());
        let units = parser.parse().unwrap();
        match &units[2] {
            StructuralUnit::Scene { heading, .. } => assert_eq!(heading, "i/e. CAR - CONTINUOUS"),
            other => panic!("unexpected unit: {other:?}"),
        }
    }

    #[test]
    fn test_content_before_first_heading_ignored() {
        let (_dir, path) = write_temp(SAMPLE);
        let parser = ScriptParser::new(path, "mov".to_string());
        let units = parser.parse().unwrap();
        assert!(!units.iter().any(|u| u.text().contains("FADE IN")));
    }

    #[test]
    fn test_parse_empty_source() {
        let (_dir, path) = write_temp("");
        let parser = ScriptParser::new(path, "mov".to_string());
        assert!(parser.parse().unwrap().is_empty());
    }

    #[test]
    fn test_chunk_one_per_scene() {
        let (_dir, path) = write_temp(SAMPLE);
        let parser = ScriptParser::new(path, "mov".to_string());
        let codec = TokenCodec::new().unwrap();
        let units = parser.parse().unwrap();
        let chunks = parser
            .chunk(&units, &codec, &ChunkParams::defaults_for(DocType::Script))
            .unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.starts_with("SCENE 1: INT. CAFE - DAY\n\n"));
        assert_eq!(chunks[1].metadata.scene_number, Some(2));
        let re = regex::Regex::new(r"^mov_0[123]_001_[0-9a-f]{7}$").unwrap();
        for chunk in &chunks {
            assert!(re.is_match(&chunk.id), "id: {}", chunk.id);
        }
    }

    #[test]
    fn test_extract_metadata() {
        let (_dir, path) = write_temp(SAMPLE);
        let parser = ScriptParser::new(path, "mov".to_string());
        let meta = parser.extract_metadata().unwrap();
        assert_eq!(meta["num_scenes"], 3);
        assert_eq!(meta["scene_headings"][0], "INT. CAFE - DAY");
    }
}
