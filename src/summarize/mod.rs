//! Hierarchical summarization orchestration (C9).
//!
//! Map-reduce over a document's chunks: chunks group by unit number into
//! unit texts, each unit is summarized (batched and reduced when it
//! exceeds the call budget), and the document summary reduces over the
//! concatenated unit summaries. A counting semaphore caps in-flight LLM
//! calls.

mod openai;
mod prompts;

pub use openai::OpenAiSummaryModel;
pub use prompts::{document_label, unit_label};

use crate::chunk::Chunk;
use crate::error::{DownstreamError, Result};
use crate::parse::DocType;
use crate::token::{TokenCodec, unit_of_chunk_id};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Token budget for a single summarization call.
pub const CALL_BUDGET_TOKENS: usize = 100_000;

/// Token budget for the document-level reduce input.
pub const REDUCE_BUDGET_TOKENS: usize = 25_000;

/// Maximum in-flight LLM calls.
pub const MAX_CONCURRENT_CALLS: usize = 4;

/// The summarizer's LLM call contract.
///
/// Implementations complete a single prompt into text. Retries belong to
/// the implementation; the orchestrator treats a returned error as final.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    /// Completes one prompt.
    ///
    /// # Errors
    ///
    /// Returns an error when the call fails after the implementation's
    /// own retries.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// One per-unit digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    /// Unit number the summary covers.
    pub unit_number: u32,
    /// Summary text.
    pub summary: String,
}

/// Map-reduce summarization orchestrator.
pub struct Summarizer<'a> {
    model: &'a dyn SummaryModel,
    codec: &'a TokenCodec,
    doc_type: DocType,
    semaphore: Arc<Semaphore>,
    call_budget: usize,
    reduce_budget: usize,
}

impl<'a> Summarizer<'a> {
    /// Creates a summarizer for one document.
    #[must_use]
    pub fn new(model: &'a dyn SummaryModel, codec: &'a TokenCodec, doc_type: DocType) -> Self {
        Self {
            model,
            codec,
            doc_type,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_CALLS)),
            call_budget: CALL_BUDGET_TOKENS,
            reduce_budget: REDUCE_BUDGET_TOKENS,
        }
    }

    /// Overrides the call budgets (tests use small values).
    #[must_use]
    pub const fn with_budgets(mut self, call_budget: usize, reduce_budget: usize) -> Self {
        self.call_budget = call_budget;
        self.reduce_budget = reduce_budget;
        self
    }

    /// Produces `(section_summaries, document_summary)` for a document's
    /// chunks.
    ///
    /// Unit summaries run in parallel under the concurrency cap; the
    /// document summary reduces over them afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error when an LLM call fails.
    pub async fn summarize_hierarchy(
        &self,
        chunks: &[Chunk],
    ) -> Result<(Vec<SectionSummary>, String)> {
        if chunks.is_empty() {
            return Ok((Vec::new(), String::new()));
        }

        // Group chunk texts by the unit number parsed from the id;
        // BTreeMap keeps units in reading order
        let mut units: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        for chunk in chunks {
            let Some(unit) = unit_of_chunk_id(&chunk.id) else {
                warn!(chunk_id = %chunk.id, "chunk id missing unit number, skipped");
                continue;
            };
            units.entry(unit).or_default().push(&chunk.text);
        }

        let tasks = units
            .into_iter()
            .map(|(unit, texts)| self.summarize_unit(unit, texts.join("\n")));
        let section_summaries = futures_util::future::try_join_all(tasks).await?;

        let document_summary = self.summarize_document(&section_summaries).await?;
        info!(
            sections = section_summaries.len(),
            doc_type = %self.doc_type,
            "hierarchical summarization complete"
        );
        Ok((section_summaries, document_summary))
    }

    /// Summarizes one unit, batching and reducing when its text exceeds
    /// the call budget.
    async fn summarize_unit(&self, unit: u32, text: String) -> Result<SectionSummary> {
        let batches = self.codec.split_balanced(&text, self.call_budget)?;

        let summary = if batches.len() == 1 {
            self.call(prompts::unit_prompt(self.doc_type, &text)).await?
        } else {
            info!(unit, batches = batches.len(), "unit exceeds call budget, reducing in parts");
            let parts = futures_util::future::try_join_all(
                batches
                    .iter()
                    .map(|batch| self.call(prompts::unit_prompt(self.doc_type, batch))),
            )
            .await?;
            let combined = numbered_parts(&parts);
            self.call(prompts::unit_reduce_prompt(self.doc_type, &combined))
                .await?
        };

        Ok(SectionSummary {
            unit_number: unit,
            summary,
        })
    }

    /// Reduces section summaries into the document summary.
    async fn summarize_document(&self, sections: &[SectionSummary]) -> Result<String> {
        let label = prompts::unit_label(self.doc_type);
        let joined = sections
            .iter()
            .map(|s| format!("{} {}: {}", capitalize(label), s.unit_number, s.summary))
            .collect::<Vec<_>>()
            .join("\n\n");

        let batches = self.codec.split_balanced(&joined, self.reduce_budget)?;
        if batches.len() == 1 {
            return self
                .call(prompts::document_prompt(self.doc_type, &joined))
                .await;
        }

        info!(batches = batches.len(), "document reduce exceeds budget, reducing in parts");
        let mut parts = Vec::with_capacity(batches.len());
        for batch in &batches {
            parts.push(
                self.call(prompts::document_prompt(self.doc_type, batch))
                    .await?,
            );
        }
        if parts.len() == 1 {
            return Ok(parts.remove(0));
        }

        let combined = numbered_parts(&parts);
        self.call(prompts::document_reduce_prompt(self.doc_type, &combined))
            .await
    }

    /// Issues one LLM call under the concurrency cap.
    async fn call(&self, prompt: String) -> Result<String> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| DownstreamError::Llm(format!("semaphore closed: {e}")))?;
        let output = self.model.complete(&prompt).await?;
        Ok(output.trim().to_string())
    }
}

fn numbered_parts(parts: &[String]) -> String {
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| format!("Part {}: {}", i + 1, part))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMetadata;
    use std::sync::Mutex;

    /// Deterministic model that records prompts and answers with a digest
    /// of the input.
    struct EchoModel {
        calls: Mutex<Vec<String>>,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SummaryModel for EchoModel {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.lock().unwrap().push(prompt.to_string());
            Ok(format!("summary[{}]", prompt.len()))
        }
    }

    fn chunk(id: &str, text: &str) -> Chunk {
        Chunk {
            id: id.to_string(),
            text: text.to_string(),
            num_tokens: 5,
            num_chars: text.len(),
            metadata: ChunkMetadata::default(),
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new().unwrap()
    }

    #[tokio::test]
    async fn test_summarize_groups_by_unit() {
        let model = EchoModel::new();
        let codec = codec();
        let summarizer = Summarizer::new(&model, &codec, DocType::Book);

        let chunks = vec![
            chunk("bok_01_001_aaaaaaa", "chapter one part one"),
            chunk("bok_01_002_bbbbbbb", "chapter one part two"),
            chunk("bok_02_001_ccccccc", "chapter two"),
        ];
        let (sections, document) = summarizer.summarize_hierarchy(&chunks).await.unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].unit_number, 1);
        assert_eq!(sections[1].unit_number, 2);
        assert!(!document.is_empty());
        // Two unit calls plus one document call
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_summarize_empty_chunks() {
        let model = EchoModel::new();
        let codec = codec();
        let summarizer = Summarizer::new(&model, &codec, DocType::Book);
        let (sections, document) = summarizer.summarize_hierarchy(&[]).await.unwrap();
        assert!(sections.is_empty());
        assert!(document.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_unit_batches_and_reduces() {
        let model = EchoModel::new();
        let codec = codec();
        let summarizer =
            Summarizer::new(&model, &codec, DocType::Book).with_budgets(50, REDUCE_BUDGET_TOKENS);

        let big_text = "many words in this enormous chapter body ".repeat(40);
        let chunks = vec![chunk("bok_01_001_aaaaaaa", &big_text)];
        let (sections, _) = summarizer.summarize_hierarchy(&chunks).await.unwrap();

        assert_eq!(sections.len(), 1);
        // Several batch calls, one unit reduce, one document call
        assert!(model.call_count() > 3);
        let calls = model.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c.contains("different parts of the same chapter")));
    }

    #[tokio::test]
    async fn test_document_reduce_over_budget() {
        let model = EchoModel::new();
        let codec = codec();
        // Tiny reduce budget forces the document-side batch path
        let summarizer =
            Summarizer::new(&model, &codec, DocType::Report).with_budgets(CALL_BUDGET_TOKENS, 20);

        let chunks = vec![
            chunk("rpt_01_001_aaaaaaa", "findings findings findings findings"),
            chunk("rpt_02_001_bbbbbbb", "methods methods methods methods"),
            chunk("rpt_03_001_ccccccc", "conclusion conclusion conclusion"),
        ];
        let (sections, document) = summarizer.summarize_hierarchy(&chunks).await.unwrap();
        assert_eq!(sections.len(), 3);
        assert!(!document.is_empty());
    }

    #[tokio::test]
    async fn test_prompt_selected_by_doc_type() {
        let model = EchoModel::new();
        let codec = codec();
        let summarizer = Summarizer::new(&model, &codec, DocType::Script);
        let chunks = vec![chunk("mov_01_001_aaaaaaa", "SCENE 1: INT. CAFE - DAY")];
        summarizer.summarize_hierarchy(&chunks).await.unwrap();

        let calls = model.calls.lock().unwrap();
        assert!(calls[0].contains("scene"));
        assert!(calls[1].contains("screenplay"));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("chapter"), "Chapter");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_numbered_parts() {
        let parts = vec!["first".to_string(), "second".to_string()];
        assert_eq!(numbered_parts(&parts), "Part 1: first\n\nPart 2: second");
    }
}
