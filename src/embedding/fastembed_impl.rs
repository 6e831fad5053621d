//! `FastEmbed`-based semantic embedder.
//!
//! Real semantic embeddings using the all-MiniLM-L6-v2 model via
//! fastembed-rs. Only available when the `fastembed-embeddings` feature
//! is enabled.

use crate::embedding::{DEFAULT_DIMENSIONS, Embedder};
use crate::error::{DownstreamError, Result};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::OnceLock;

/// Thread-safe singleton for the embedding model, lazily initialized on
/// first use to preserve cold start time.
static EMBEDDING_MODEL: OnceLock<std::sync::Mutex<fastembed::TextEmbedding>> = OnceLock::new();

/// `FastEmbed` embedder using all-MiniLM-L6-v2.
///
/// The model is lazily loaded on the first embed call. Outputs are
/// L2-normalized by the model, matching the embedder contract.
///
/// # Examples
///
/// ```ignore
/// use docdex::embedding::FastEmbedEmbedder;
///
/// let embedder = FastEmbedEmbedder::new()?;
/// let embedding = embedder.embed("Hello, world!")?;
/// assert_eq!(embedding.len(), 384);
/// ```
pub struct FastEmbedEmbedder {
    /// Model name for debugging.
    model_name: &'static str,
}

impl FastEmbedEmbedder {
    /// Creates a new `FastEmbed` embedder.
    ///
    /// Note: the model is lazily loaded on first `embed()` call.
    ///
    /// # Errors
    ///
    /// Returns an error if model initialization fails.
    #[allow(clippy::missing_const_for_fn)]
    pub fn new() -> Result<Self> {
        Ok(Self {
            model_name: "all-MiniLM-L6-v2",
        })
    }

    /// Gets or initializes the embedding model (thread-safe).
    fn get_model() -> Result<&'static std::sync::Mutex<fastembed::TextEmbedding>> {
        if let Some(model) = EMBEDDING_MODEL.get() {
            return Ok(model);
        }

        let options = fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
            .with_show_download_progress(false);

        let model = fastembed::TextEmbedding::try_new(options)
            .map_err(|e| DownstreamError::Embedding(format!("failed to load model: {e}")))?;

        // Store the model, ignoring if another thread beat us to it
        let _ = EMBEDDING_MODEL.set(std::sync::Mutex::new(model));

        EMBEDDING_MODEL
            .get()
            .ok_or_else(|| DownstreamError::Embedding("model initialization race".to_string()).into())
    }

    /// Returns the model name.
    #[must_use]
    pub const fn model_name(&self) -> &'static str {
        self.model_name
    }

    fn run_model(texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let model = Self::get_model()?;
        let mut model = model
            .lock()
            .map_err(|e| DownstreamError::Embedding(format!("failed to lock model: {e}")))?;

        // ONNX runtime can panic on malformed inputs; contain it
        let result = catch_unwind(AssertUnwindSafe(|| model.embed(texts.to_vec(), None)));

        result
            .map_err(|panic_info| {
                let msg = panic_info
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic_info.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                DownstreamError::Embedding(format!("ONNX runtime panic: {msg}"))
            })?
            .map_err(|e| DownstreamError::Embedding(e.to_string()).into())
    }
}

impl Embedder for FastEmbedEmbedder {
    fn dimensions(&self) -> usize {
        DEFAULT_DIMENSIONS
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(DownstreamError::Embedding("cannot embed empty text".to_string()).into());
        }

        Self::run_model(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| DownstreamError::Embedding("no embedding returned".to_string()).into())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.is_empty()) {
            return Err(DownstreamError::Embedding("cannot embed empty text".to_string()).into());
        }

        Self::run_model(texts)
    }
}
