//! Conversation result diversifier (C8).
//!
//! Retrieval over transcripts tends to cluster hits around one exchange
//! and one voice. This post-filter re-selects hydrated results for
//! temporal spread (>= 5 minutes between timestamped picks) and speaker
//! balance (at most two chunks per speaker).

use crate::index::StoredChunk;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Minimum spacing between two accepted timestamped chunks, in seconds.
const MIN_GAP_SECONDS: i64 = 300;

/// Maximum accepted chunks per speaker.
const MAX_PER_SPEAKER: usize = 2;

/// Result sets of this size or smaller pass through untouched.
const ACTIVATION_THRESHOLD: usize = 5;

/// Parses a metadata timestamp into comparable seconds.
///
/// Accepts datetime forms (`2024-01-15 14:30:00`, `2024-01-15 14:30`,
/// `2024-01-15`) and bare clock offsets (`14:30:00`, `14:30`). Returns
/// `None` for anything else.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    }

    // Bare clock offsets from conversation turn prefixes
    for fmt in ["%H:%M:%S", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(value, fmt) {
            return Some(t.signed_duration_since(NaiveTime::MIN).num_seconds());
        }
    }

    None
}

/// The timestamp a chunk sorts by: `timestamp`, `created_at`, then
/// `timestamp_start`.
fn chunk_timestamp(chunk: &StoredChunk) -> Option<i64> {
    chunk
        .metadata
        .timestamp
        .as_deref()
        .or(chunk.metadata.created_at.as_deref())
        .or(chunk.metadata.timestamp_start.as_deref())
        .and_then(parse_timestamp)
}

/// The speaker a chunk counts against: `speakers[0]` when present.
fn chunk_speaker(chunk: &StoredChunk) -> Option<&str> {
    chunk
        .metadata
        .speakers
        .as_ref()
        .and_then(|s| s.first())
        .map(String::as_str)
}

/// Re-selects conversation results for temporal and speaker spread.
///
/// Inputs of <= 5 chunks pass through unchanged regardless of `target`.
/// Above that, chunks are sorted by (timestamp, original rank) with
/// timestamp-less chunks at the end, then greedily accepted while each
/// speaker stays under its cap and timestamped picks stay at least five
/// minutes apart, stopping at `target` (default `max(5, n / 2)`).
#[must_use]
pub fn diversify(chunks: &[StoredChunk], target: Option<usize>) -> Vec<StoredChunk> {
    if chunks.len() <= ACTIVATION_THRESHOLD {
        return chunks.to_vec();
    }

    let target = target.unwrap_or_else(|| 5.max(chunks.len() / 2));

    let mut ordered: Vec<(usize, &StoredChunk, Option<i64>)> = chunks
        .iter()
        .enumerate()
        .map(|(rank, chunk)| (rank, chunk, chunk_timestamp(chunk)))
        .collect();
    // Timestamp ascending, original rank breaking ties; no timestamp
    // sorts to the end
    ordered.sort_by(|a, b| match (a.2, b.2) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.0.cmp(&b.0)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    let mut selected: Vec<StoredChunk> = Vec::with_capacity(target);
    let mut speaker_counts: std::collections::HashMap<&str, usize> =
        std::collections::HashMap::new();
    let mut last_accepted_ts: Option<i64> = None;

    for (_, chunk, ts) in ordered {
        if selected.len() >= target {
            break;
        }

        if let Some(speaker) = chunk_speaker(chunk) {
            let count = speaker_counts.get(speaker).copied().unwrap_or(0);
            if count >= MAX_PER_SPEAKER {
                continue;
            }
        }

        if let (Some(ts), Some(last)) = (ts, last_accepted_ts)
            && ts - last < MIN_GAP_SECONDS
        {
            continue;
        }

        if let Some(speaker) = chunk_speaker(chunk) {
            *speaker_counts.entry(speaker).or_insert(0) += 1;
        }
        if ts.is_some() {
            last_accepted_ts = ts;
        }
        selected.push(chunk.clone());
    }

    selected
}
