//! Chunk model and token-budgeted chunking (C3).
//!
//! Chunks are the atomic retrieval unit: a bounded-length segment of one
//! structural unit with a stable id of the form
//! `{slug}_{unit:02}_{ordinal:03}_{hash7}`. Two strategies exist:
//! stride windows over the token sequence for text units, and greedy turn
//! packing for conversations.

use crate::error::Result;
use crate::token::{TokenCodec, chunk_id};
use serde::{Deserialize, Serialize};

/// The atomic retrieval unit.
///
/// Never mutated after creation; removed only by whole-document delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable id: `{slug}_{unit:02}_{ordinal:03}_{hash7}`.
    pub id: String,
    /// The exact text embedded and indexed.
    pub text: String,
    /// Token count of the underlying window.
    pub num_tokens: usize,
    /// Character count of the underlying window.
    pub num_chars: usize,
    /// Unit-kind-specific fields needed at query time.
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Returns the slug prefix of this chunk's id.
    #[must_use]
    pub fn slug(&self) -> &str {
        // Ids are {slug}_{unit:02}_{ordinal:03}_{hash7}; the slug may itself
        // contain underscores, so strip the three trailing segments.
        let mut end = self.id.len();
        for _ in 0..3 {
            if let Some(pos) = self.id[..end].rfind('_') {
                end = pos;
            }
        }
        &self.id[..end]
    }
}

/// Unit-kind-specific chunk metadata.
///
/// A single struct with optionals rather than a variant per kind: the
/// vector payload and the diversifier both read it field-wise, and absent
/// fields are skipped during serialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    /// Book: chapter number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,
    /// Book: chapter title (first line, truncated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_title: Option<String>,
    /// Script: scene number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_number: Option<u32>,
    /// Script / tech doc / report: heading text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    /// Conversation: first turn number in this chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_start: Option<u32>,
    /// Conversation: last turn number in this chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_end: Option<u32>,
    /// Conversation: distinct speakers, in order of first appearance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speakers: Option<Vec<String>>,
    /// Conversation: timestamp of the first turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_start: Option<String>,
    /// Conversation: timestamp of the last turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_end: Option<String>,
    /// Conversation: number of turns packed into this chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    /// Tech doc: section label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Report: canonical section type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_type: Option<String>,
    /// Tech doc: code-block heuristic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_code: Option<bool>,
    /// Tech doc / report: table heuristic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_table: Option<bool>,
    /// Sub-window of a section that exceeded the token budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_partial: Option<bool>,
    /// Free-form timestamp, when the source carries one per chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Record creation timestamp, when the source carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Global chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    /// Token budget per chunk.
    pub max_tokens: usize,
    /// Token overlap between consecutive windows.
    pub overlap: usize,
    /// Turn overlap for conversation packing.
    pub overlap_turns: usize,
}

impl ChunkParams {
    /// Per-document-type defaults.
    #[must_use]
    pub const fn defaults_for(doc_type: crate::parse::DocType) -> Self {
        use crate::parse::DocType;
        match doc_type {
            DocType::Book => Self {
                max_tokens: 500,
                overlap: 100,
                overlap_turns: 2,
            },
            DocType::Script | DocType::TechDoc => Self {
                max_tokens: 800,
                overlap: 50,
                overlap_turns: 2,
            },
            DocType::Report => Self {
                max_tokens: 700,
                overlap: 50,
                overlap_turns: 2,
            },
            DocType::Conversation => Self {
                max_tokens: 500,
                overlap: 100,
                overlap_turns: 2,
            },
        }
    }

    /// Overrides the token budget.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Overrides the overlap.
    #[must_use]
    pub const fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }
}

/// A speaker turn as emitted by the conversation parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRecord {
    /// 1-based turn number in emission order.
    pub number: u32,
    /// Speaker name, trimmed.
    pub speaker: String,
    /// Clock timestamp if the turn prefix carried one.
    pub timestamp: Option<String>,
    /// Turn text including continuation lines.
    pub text: String,
}

/// Splits one structural unit into token-budgeted chunks.
///
/// Windows of `max_tokens` tokens advance by `max_tokens - overlap`; the
/// last window may be shorter and is still emitted. A unit that fits in
/// one window becomes a single chunk with ordinal 001; `heading_prefix`
/// (when given) is prepended to that chunk's display text, while the id
/// hash and counts stay functions of the window text. Sub-windows of an
/// oversized unit are flagged `is_partial` when `mark_partial` is set.
///
/// # Errors
///
/// Returns an error for invalid `(max_tokens, overlap)` or a token-codec
/// failure, both of which abort the ingest.
#[allow(clippy::cast_possible_truncation)]
pub fn split_unit(
    codec: &TokenCodec,
    slug: &str,
    unit: u32,
    text: &str,
    heading_prefix: Option<&str>,
    params: &ChunkParams,
    base: &ChunkMetadata,
    mark_partial: bool,
) -> Result<Vec<Chunk>> {
    let windows = codec.split_with_overlap(text, params.max_tokens, params.overlap)?;
    if windows.is_empty() {
        return Ok(Vec::new());
    }

    let single = windows.len() == 1;
    let mut chunks = Vec::with_capacity(windows.len());
    for (i, (window_text, num_tokens)) in windows.into_iter().enumerate() {
        let ordinal = (i + 1) as u32;
        let id = chunk_id(slug, unit, ordinal, &window_text);
        let num_chars = window_text.len();

        let mut metadata = base.clone();
        if !single && mark_partial {
            metadata.is_partial = Some(true);
        }

        let display_text = if single {
            heading_prefix.map_or_else(|| window_text.clone(), |p| format!("{p}{window_text}"))
        } else {
            window_text.clone()
        };

        chunks.push(Chunk {
            id,
            text: display_text,
            num_tokens,
            num_chars,
            metadata,
        });
    }
    Ok(chunks)
}

/// Packs speaker turns into token-budgeted chunks (conversations).
///
/// Greedy accumulation: turns join the current group while the running
/// token sum stays within `max_tokens`. A single turn exceeding the budget
/// is emitted alone. The next group starts at
/// `max(prev_start + 1, prev_end - overlap_turns)`, which guarantees
/// forward progress even with large overlap.
///
/// # Errors
///
/// Returns an error on token-codec failure.
#[allow(clippy::cast_possible_truncation)]
pub fn pack_turns(
    codec: &TokenCodec,
    slug: &str,
    turns: &[TurnRecord],
    params: &ChunkParams,
) -> Result<Vec<Chunk>> {
    if turns.is_empty() {
        return Ok(Vec::new());
    }

    let turn_tokens: Vec<usize> = turns.iter().map(|t| codec.count(&t.text)).collect();

    let mut chunks = Vec::new();
    let mut chunk_index: u32 = 0;
    let mut position = 0usize;

    while position < turns.len() {
        let mut group_end = position;
        let mut group_tokens = 0usize;

        while group_end < turns.len() {
            let next = turn_tokens[group_end];
            if group_tokens + next > params.max_tokens && group_end > position {
                break;
            }
            group_tokens += next;
            group_end += 1;
            // A single oversized turn is emitted alone
            if group_tokens > params.max_tokens {
                break;
            }
        }

        let group = &turns[position..group_end];
        let text = serialize_turns(group);
        chunk_index += 1;

        let speakers = distinct_speakers(group);
        let metadata = ChunkMetadata {
            turn_start: group.first().map(|t| t.number),
            turn_end: group.last().map(|t| t.number),
            speakers: Some(speakers),
            timestamp_start: group.first().and_then(|t| t.timestamp.clone()),
            timestamp_end: group.last().and_then(|t| t.timestamp.clone()),
            num_turns: Some(group.len() as u32),
            ..ChunkMetadata::default()
        };

        let id = chunk_id(slug, chunk_index, 1, &text);
        let num_chars = text.len();
        chunks.push(Chunk {
            id,
            text,
            num_tokens: group_tokens,
            num_chars,
            metadata,
        });

        position = (position + 1).max(group_end.saturating_sub(params.overlap_turns));
    }

    Ok(chunks)
}

/// Re-serializes turns in the canonical `Speaker (HH:MM:SS): text` form.
fn serialize_turns(turns: &[TurnRecord]) -> String {
    let lines: Vec<String> = turns
        .iter()
        .map(|t| {
            t.timestamp.as_ref().map_or_else(
                || format!("{}: {}", t.speaker, t.text),
                |ts| format!("{} ({ts}): {}", t.speaker, t.text),
            )
        })
        .collect();
    lines.join("\n")
}

/// Distinct speakers in order of first appearance.
fn distinct_speakers(turns: &[TurnRecord]) -> Vec<String> {
    let mut seen = Vec::new();
    for turn in turns {
        if !seen.contains(&turn.speaker) {
            seen.push(turn.speaker.clone());
        }
    }
    seen
}
