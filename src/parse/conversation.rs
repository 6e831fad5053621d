//! Conversation parser: turn-based decomposition for chat logs and
//! transcripts.
//!
//! Recognized turn prefixes, tried in order on each non-empty line:
//! `[HH:MM:SS] Speaker: text`, `Speaker (HH:MM): text`, `Speaker: text`,
//! `Speaker> text`. Lines matching none are appended to the current turn.

use crate::chunk::{Chunk, ChunkParams, TurnRecord, pack_turns};
use crate::error::Result;
use crate::parse::{DocType, DocumentParser, StructuralUnit, source_format};
use crate::token::TokenCodec;
use regex::Regex;
use std::path::PathBuf;

/// Parser for speaker-turn transcripts.
pub struct ConversationParser {
    path: PathBuf,
    slug: String,
    /// Turn prefix patterns in priority order.
    patterns: Vec<TurnPattern>,
}

/// One recognized turn-prefix shape.
struct TurnPattern {
    regex: Regex,
    /// Whether the timestamp group precedes the speaker group.
    timestamp_first: bool,
    /// Whether the pattern captures a timestamp at all.
    has_timestamp: bool,
}

impl ConversationParser {
    /// Creates a conversation parser.
    ///
    /// # Errors
    ///
    /// Returns an error if a turn pattern fails to compile (static
    /// patterns; this indicates a build defect).
    pub fn new(path: PathBuf, slug: String) -> Result<Self> {
        let make = |p: &str| Regex::new(p).map_err(crate::error::ParserError::from);
        let patterns = vec![
            // "[00:12:34] Alice: message"
            TurnPattern {
                regex: make(r"^\[(\d{2}:\d{2}:\d{2})\]\s*([^:]+):\s*(.+)$")?,
                timestamp_first: true,
                has_timestamp: true,
            },
            // "Alice (14:30): message"
            TurnPattern {
                regex: make(r"^([^(]+?)\s*\((\d{2}:\d{2})\):\s*(.+)$")?,
                timestamp_first: false,
                has_timestamp: true,
            },
            // "Alice: message"
            TurnPattern {
                regex: make(r"^([^:]+):\s*(.+)$")?,
                timestamp_first: false,
                has_timestamp: false,
            },
            // "Alice> message"
            TurnPattern {
                regex: make(r"^([^>]+)>\s*(.+)$")?,
                timestamp_first: false,
                has_timestamp: false,
            },
        ];
        Ok(Self {
            path,
            slug,
            patterns,
        })
    }

    /// Parses the source into turn records.
    fn parse_turns(&self) -> Result<Vec<TurnRecord>> {
        let content = self.read()?;

        let mut turns: Vec<TurnRecord> = Vec::new();
        let mut current: Option<(String, Option<String>, Vec<String>)> = None;

        for raw_line in content.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let mut matched = false;
            for pattern in &self.patterns {
                let Some(caps) = pattern.regex.captures(line) else {
                    continue;
                };

                if let Some((speaker, timestamp, lines)) = current.take() {
                    push_turn(&mut turns, speaker, timestamp, &lines);
                }

                let (speaker, timestamp, text) = if pattern.has_timestamp {
                    if pattern.timestamp_first {
                        (caps[2].to_string(), Some(caps[1].to_string()), caps[3].to_string())
                    } else {
                        (caps[1].to_string(), Some(caps[2].to_string()), caps[3].to_string())
                    }
                } else {
                    (caps[1].to_string(), None, caps[2].to_string())
                };

                current = Some((speaker, timestamp, vec![text]));
                matched = true;
                break;
            }

            if !matched && let Some((_, _, lines)) = current.as_mut() {
                lines.push(line.to_string());
            }
        }

        if let Some((speaker, timestamp, lines)) = current {
            push_turn(&mut turns, speaker, timestamp, &lines);
        }

        Ok(turns)
    }

    /// Converts a clock timestamp ("HH:MM:SS" or "MM:SS") to seconds.
    fn clock_seconds(timestamp: &str) -> Option<i64> {
        let parts: Vec<&str> = timestamp.split(':').collect();
        match parts.as_slice() {
            [h, m, s] => Some(
                h.parse::<i64>().ok()? * 3600 + m.parse::<i64>().ok()? * 60 + s.parse::<i64>().ok()?,
            ),
            [m, s] => Some(m.parse::<i64>().ok()? * 60 + s.parse::<i64>().ok()?),
            _ => None,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn push_turn(
    turns: &mut Vec<TurnRecord>,
    speaker: String,
    timestamp: Option<String>,
    lines: &[String],
) {
    let text = lines.join("\n").trim().to_string();
    if text.is_empty() {
        return;
    }
    turns.push(TurnRecord {
        number: turns.len() as u32 + 1,
        speaker: speaker.trim().to_string(),
        timestamp,
        text,
    });
}

impl DocumentParser for ConversationParser {
    fn doc_type(&self) -> DocType {
        DocType::Conversation
    }

    fn read(&self) -> Result<String> {
        crate::io::read_source(&self.path)
    }

    fn parse(&self) -> Result<Vec<StructuralUnit>> {
        Ok(self
            .parse_turns()?
            .into_iter()
            .map(|t| StructuralUnit::Turn {
                number: t.number,
                speaker: t.speaker,
                timestamp: t.timestamp,
                text: t.text,
            })
            .collect())
    }

    fn chunk(
        &self,
        units: &[StructuralUnit],
        codec: &TokenCodec,
        params: &ChunkParams,
    ) -> Result<Vec<Chunk>> {
        let turns: Vec<TurnRecord> = units
            .iter()
            .filter_map(|u| match u {
                StructuralUnit::Turn {
                    number,
                    speaker,
                    timestamp,
                    text,
                } => Some(TurnRecord {
                    number: *number,
                    speaker: speaker.clone(),
                    timestamp: timestamp.clone(),
                    text: text.clone(),
                }),
                _ => None,
            })
            .collect();
        pack_turns(codec, &self.slug, &turns, params)
    }

    fn extract_metadata(&self) -> Result<serde_json::Value> {
        let turns = self.parse_turns()?;
        if turns.is_empty() {
            return Ok(serde_json::json!({}));
        }

        let mut participants: Vec<&str> = Vec::new();
        for turn in &turns {
            if !participants.contains(&turn.speaker.as_str()) {
                participants.push(&turn.speaker);
            }
        }

        let timestamps: Vec<&str> = turns
            .iter()
            .filter_map(|t| t.timestamp.as_deref())
            .collect();
        let duration_seconds = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last)) if timestamps.len() >= 2 => {
                match (Self::clock_seconds(first), Self::clock_seconds(last)) {
                    (Some(a), Some(b)) => Some(b - a),
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(serde_json::json!({
            "source_format": source_format(&self.path),
            "participants": participants,
            "num_participants": participants.len(),
            "num_turns": turns.len(),
            "has_timestamps": !timestamps.is_empty(),
            "duration_seconds": duration_seconds,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMESTAMPED: &str = "\
[00:12:34] Alice: Morning, everyone.
[00:12:45] Bob: Morning! Did the deploy finish?
It was still running when I left.
[00:13:10] Alice: Finished around midnight.
";

    const PLAIN: &str = "\
Alice: First point.
Bob: Counterpoint.
Alice: Rebuttal.
";

    fn write_temp(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.txt");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn parser(path: PathBuf) -> ConversationParser {
        ConversationParser::new(path, "cnv".to_string()).unwrap()
    }

    #[test]
    fn test_parse_timestamped_turns() {
        let (_dir, path) = write_temp(TIMESTAMPED);
        let turns = parser(path).parse_turns().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0].speaker, "Alice");
        assert_eq!(turns[0].timestamp.as_deref(), Some("00:12:34"));
        assert_eq!(turns[0].text, "Morning, everyone.");
    }

    #[test]
    fn test_continuation_lines_append() {
        let (_dir, path) = write_temp(TIMESTAMPED);
        let turns = parser(path).parse_turns().unwrap();
        assert!(turns[1].text.contains("Did the deploy finish?"));
        assert!(turns[1].text.contains("still running when I left"));
    }

    #[test]
    fn test_parse_plain_speaker_turns() {
        let (_dir, path) = write_temp(PLAIN);
        let turns = parser(path).parse_turns().unwrap();
        assert_eq!(turns.len(), 3);
        assert!(turns.iter().all(|t| t.timestamp.is_none()));
        assert_eq!(turns[2].text, "Rebuttal.");
    }

    #[test]
    fn test_parse_paren_timestamp_format() {
        let (_dir, path) = write_temp("Alice (14:30): short note\nBob (14:32): reply\n");
        let turns = parser(path).parse_turns().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].timestamp.as_deref(), Some("14:30"));
        assert_eq!(turns[1].speaker, "Bob");
    }

    #[test]
    fn test_parse_angle_bracket_format() {
        let (_dir, path) = write_temp("alice> hi there\nbob> hello\n");
        let turns = parser(path).parse_turns().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].speaker, "alice");
        assert_eq!(turns[0].text, "hi there");
    }

    #[test]
    fn test_turn_numbering_1_based() {
        let (_dir, path) = write_temp(PLAIN);
        let turns = parser(path).parse_turns().unwrap();
        let numbers: Vec<u32> = turns.iter().map(|t| t.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_empty_source() {
        let (_dir, path) = write_temp("");
        assert!(parser(path).parse().unwrap().is_empty());
    }

    #[test]
    fn test_chunk_canonical_serialization() {
        let (_dir, path) = write_temp(TIMESTAMPED);
        let p = parser(path);
        let codec = TokenCodec::new().unwrap();
        let units = p.parse().unwrap();
        let chunks = p
            .chunk(
                &units,
                &codec,
                &ChunkParams::defaults_for(DocType::Conversation),
            )
            .unwrap();
        // The overlap rule re-emits trailing windows: turns 1-3, 2-3, 3
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.starts_with("Alice (00:12:34): Morning, everyone."));
        assert_eq!(
            chunks[0].metadata.speakers,
            Some(vec!["Alice".to_string(), "Bob".to_string()])
        );
        assert_eq!(chunks[0].metadata.turn_start, Some(1));
        assert_eq!(chunks[0].metadata.turn_end, Some(3));
        assert_eq!(chunks[0].metadata.timestamp_start.as_deref(), Some("00:12:34"));
        assert_eq!(chunks[0].metadata.timestamp_end.as_deref(), Some("00:13:10"));
        assert_eq!(chunks[2].metadata.turn_start, Some(3));
    }

    #[test]
    fn test_extract_metadata() {
        let (_dir, path) = write_temp(TIMESTAMPED);
        let meta = parser(path).extract_metadata().unwrap();
        assert_eq!(meta["num_turns"], 3);
        assert_eq!(meta["num_participants"], 2);
        assert_eq!(meta["has_timestamps"], true);
        // 00:12:34 -> 00:13:10 is 36 seconds
        assert_eq!(meta["duration_seconds"], 36);
    }

    #[test]
    fn test_clock_seconds() {
        assert_eq!(ConversationParser::clock_seconds("00:12:34"), Some(754));
        assert_eq!(ConversationParser::clock_seconds("14:30"), Some(870));
        assert_eq!(ConversationParser::clock_seconds("oops"), None);
    }
}
