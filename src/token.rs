//! Token counting and chunk identity (C1).
//!
//! Wraps the cl100k_base byte-pair encoder from `tiktoken-rs` behind a
//! small codec type, and derives the stable identifiers used throughout the
//! pipeline: the 7-hex-digit content hash embedded in chunk ids and the
//! integer point key used by the vector backend.

use crate::error::{ParserError, Result};
use tiktoken_rs::CoreBPE;

/// Integer key space for vector points.
///
/// Point ids are `lower64(md5(chunk_id)) mod POINT_ID_SPACE`. Collisions in
/// this space are statistically possible at very large collection sizes;
/// the pipeline logs them and trusts the lexical index to disambiguate.
pub const POINT_ID_SPACE: u64 = 1_000_000_000;

/// Deterministic byte-pair token codec.
///
/// Wraps a cl100k_base `CoreBPE`. Encoding is deterministic across runs and
/// platforms, which the chunk-id contract depends on.
///
/// # Examples
///
/// ```
/// use docdex::token::TokenCodec;
///
/// let codec = TokenCodec::new().unwrap();
/// assert!(codec.count("hello world") >= 2);
/// ```
pub struct TokenCodec {
    bpe: CoreBPE,
}

impl TokenCodec {
    /// Creates a codec backed by the cl100k_base encoding.
    ///
    /// # Errors
    ///
    /// Returns a [`ParserError::TokenEncoder`] if the encoding tables fail
    /// to load.
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| ParserError::TokenEncoder(e.to_string()))?;
        Ok(Self { bpe })
    }

    /// Counts tokens in `text`.
    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Splits `text` into stride windows of `max_tokens` tokens advancing
    /// by `max_tokens - overlap`, decoding each window back to text.
    ///
    /// The last window may be shorter; it is still emitted if non-empty.
    /// Returns `(window_text, token_count)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::OverlapTooLarge`] when `overlap >= max_tokens`
    /// and [`ParserError::TokenEncoder`] when a window fails to decode.
    pub fn split_with_overlap(
        &self,
        text: &str,
        max_tokens: usize,
        overlap: usize,
    ) -> Result<Vec<(String, usize)>> {
        if max_tokens == 0 || overlap >= max_tokens {
            return Err(ParserError::OverlapTooLarge {
                overlap,
                max_tokens,
            }
            .into());
        }

        let tokens = self.bpe.encode_ordinary(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let stride = max_tokens - overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let end = (start + max_tokens).min(tokens.len());
            let window = tokens[start..end].to_vec();
            let count = window.len();
            let decoded = self
                .bpe
                .decode(window)
                .map_err(|e| ParserError::TokenEncoder(e.to_string()))?;
            windows.push((decoded, count));
            start += stride;
        }
        Ok(windows)
    }

    /// Splits `text` into roughly equal batches each within `max_tokens`.
    ///
    /// Used by the summarizer to keep LLM inputs under the call budget.
    /// Returns the text unchanged (single batch) when it already fits.
    ///
    /// # Errors
    ///
    /// Returns [`ParserError::TokenEncoder`] when a batch fails to decode.
    pub fn split_balanced(&self, text: &str, max_tokens: usize) -> Result<Vec<String>> {
        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens || max_tokens == 0 {
            return Ok(vec![text.to_string()]);
        }

        let num_batches = tokens.len() / max_tokens + 1;
        let batch_size = (tokens.len() / num_batches).max(1);

        let mut batches = Vec::with_capacity(num_batches);
        let mut start = 0;
        while start < tokens.len() {
            let end = (start + batch_size).min(tokens.len());
            let decoded = self
                .bpe
                .decode(tokens[start..end].to_vec())
                .map_err(|e| ParserError::TokenEncoder(e.to_string()))?;
            batches.push(decoded);
            start = end;
        }
        Ok(batches)
    }
}

/// Returns the first 7 hex digits of the 128-bit md5 of `text`.
#[must_use]
pub fn content_hash7(text: &str) -> String {
    let digest = md5::compute(text.as_bytes());
    let hex = format!("{digest:x}");
    hex[..7].to_string()
}

/// Builds a chunk id: `{slug}_{unit:02}_{ordinal:03}_{hash7}`.
///
/// The id is a deterministic function of (slug, unit number, chunk-in-unit
/// ordinal, text).
#[must_use]
pub fn chunk_id(slug: &str, unit: u32, ordinal: u32, text: &str) -> String {
    format!("{slug}_{unit:02}_{ordinal:03}_{}", content_hash7(text))
}

/// Derives the integer vector-point key for a chunk id.
///
/// Takes the lower 64 bits of the md5 of the id (the first 16 hex digits)
/// modulo [`POINT_ID_SPACE`].
#[must_use]
pub fn point_id(chunk_id: &str) -> u64 {
    let digest = md5::compute(chunk_id.as_bytes());
    let prefix: [u8; 8] = [
        digest.0[0], digest.0[1], digest.0[2], digest.0[3], digest.0[4], digest.0[5], digest.0[6],
        digest.0[7],
    ];
    u64::from_be_bytes(prefix) % POINT_ID_SPACE
}

/// Parses the unit number out of a chunk id.
///
/// Chunk ids have the form `{slug}_{unit:02}_{ordinal:03}_{hash7}`; slugs
/// may themselves contain underscores, so the unit is the third segment
/// from the end.
#[must_use]
pub fn unit_of_chunk_id(id: &str) -> Option<u32> {
    let parts: Vec<&str> = id.rsplitn(4, '_').collect();
    if parts.len() < 4 {
        return None;
    }
    parts[2].parse().ok()
}
