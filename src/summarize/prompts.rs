//! Prompt templates for hierarchical summarization.
//!
//! Template wording follows the document type so a scene is summarized
//! as a scene and a transcript segment as a conversation, not as prose
//! chapters.

use crate::parse::DocType;

/// The name a structural unit goes by in prompts.
#[must_use]
pub const fn unit_label(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Book => "chapter",
        DocType::Script => "scene",
        DocType::Conversation => "conversation segment",
        DocType::TechDoc | DocType::Report => "section",
    }
}

/// The name the whole document goes by in prompts.
#[must_use]
pub const fn document_label(doc_type: DocType) -> &'static str {
    match doc_type {
        DocType::Book => "book",
        DocType::Script => "screenplay",
        DocType::Conversation => "conversation",
        DocType::TechDoc => "technical document",
        DocType::Report => "report",
    }
}

/// Prompt for one structural unit.
#[must_use]
pub fn unit_prompt(doc_type: DocType, text: &str) -> String {
    let unit = unit_label(doc_type);
    let doc = document_label(doc_type);
    format!(
        "Summarize this {unit} from the {doc} into 1-2 concise paragraphs.\n\
         Capture key events, themes, and the actions of the people involved.\n\
         Avoid bullet points. Do not mention chunking.\n\n\
         {unit} text:\n{text}\n"
    )
}

/// Reduce prompt over partial summaries of one oversized unit.
#[must_use]
pub fn unit_reduce_prompt(doc_type: DocType, combined: &str) -> String {
    let unit = unit_label(doc_type);
    format!(
        "These are summaries of different parts of the same {unit}.\n\
         Combine them into 1-2 cohesive paragraphs that capture the {unit}'s key points.\n\n\
         {combined}\n"
    )
}

/// Prompt over the concatenated section summaries.
#[must_use]
pub fn document_prompt(doc_type: DocType, joined: &str) -> String {
    let unit = unit_label(doc_type);
    let doc = document_label(doc_type);
    format!(
        "Here are summaries of each {unit} of a {doc}.\n\
         Write a single cohesive overall summary of the {doc} in 2-3 paragraphs.\n\
         Do NOT enumerate {unit} by {unit}. Instead, merge into one flowing narrative.\n\
         Focus on major themes, central participants, and the overall arc.\n\n\
         {unit} summaries:\n{joined}\n"
    )
}

/// Reduce prompt over partial document summaries.
#[must_use]
pub fn document_reduce_prompt(doc_type: DocType, combined: &str) -> String {
    let doc = document_label(doc_type);
    format!(
        "These are summaries of different parts of the same {doc}.\n\
         Combine them into 2-3 cohesive paragraphs that capture the {doc}'s key themes and content.\n\n\
         {combined}\n"
    )
}
