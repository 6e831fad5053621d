//! Integration tests for docdex.
//!
//! Library-level tests cover the end-to-end decomposition scenarios and
//! the ingest/delete round-trip laws that need no external backend; CLI
//! tests drive the binary with `assert_cmd`. Scenarios needing a live
//! Qdrant or OpenAI endpoint stay in `#[ignore]`d module tests.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use docdex::chunk::ChunkParams;
use docdex::index::LexicalIndex;
use docdex::parse::{DocType, parser_for};
use docdex::token::TokenCodec;
use docdex::{rrf_fusion, weighted_rank_fusion};
use predicates::prelude::*;
use tempfile::TempDir;

fn write_source(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("failed to write source");
    path
}

#[test]
fn test_book_chapter_smoke() {
    // Two minimal chapters wrapped in Gutenberg markers yield exactly two
    // chunks with ordinal 001 ids
    let dir = TempDir::new().expect("tempdir");
    let path = write_source(
        &dir,
        "book.txt",
        "*** START OF X ***\nCHAPTER I.\nAlpha beta gamma.\nCHAPTER II.\nDelta epsilon.\n*** END OF X ***",
    );

    let parser =
        parser_for(DocType::Book, &path, "tst", Some(r"^CHAPTER [IVX]+\.")).expect("parser");
    let units = parser.parse().expect("parse");
    assert_eq!(units.len(), 2);

    let codec = TokenCodec::new().expect("codec");
    let chunks = parser
        .chunk(&units, &codec, &ChunkParams::defaults_for(DocType::Book))
        .expect("chunk");
    assert_eq!(chunks.len(), 2);

    let re = regex::Regex::new(r"^tst_0[12]_001_[0-9a-f]{7}$").expect("regex");
    for chunk in &chunks {
        assert!(re.is_match(&chunk.id), "id does not match grammar: {}", chunk.id);
    }
}

#[test]
fn test_chunk_id_determinism_across_runs() {
    let dir = TempDir::new().expect("tempdir");
    let body = "Telemachus sat among the suitors, heart sore with longing. ".repeat(30);
    let path = write_source(
        &dir,
        "book.txt",
        &format!("CHAPTER I.\n{body}\nCHAPTER II.\n{body}"),
    );

    let codec = TokenCodec::new().expect("codec");
    let run = || {
        let parser = parser_for(DocType::Book, &path, "ody", None).expect("parser");
        let units = parser.parse().expect("parse");
        parser
            .chunk(&units, &codec, &ChunkParams::defaults_for(DocType::Book))
            .expect("chunk")
            .into_iter()
            .map(|c| c.id)
            .collect::<Vec<_>>()
    };

    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn test_fusion_reference_values() {
    let lexical = vec!["A".to_string(), "B".to_string(), "C".to_string()];
    let vector = vec!["B".to_string(), "D".to_string(), "A".to_string()];

    // Weighted: A=0.8, B=0.65, C~=0.233, D=0.15
    assert_eq!(
        weighted_rank_fusion(&lexical, &vector, 0.7, 2),
        vec!["A".to_string(), "B".to_string()]
    );
    // RRF with c=60: B slightly ahead of A
    assert_eq!(
        rrf_fusion(&lexical, &vector, 2),
        vec!["B".to_string(), "A".to_string()]
    );
}

#[test]
fn test_lexical_roundtrip_and_document_scoped_delete() {
    // Build an index over two documents, persist, reload, rebuild without
    // one slug, and confirm no trace of it remains
    let dir = TempDir::new().expect("tempdir");
    let artifact = dir.path().join("bm25.idx");

    let mut index = LexicalIndex::new();
    index.build(&[
        ("tst_01_001_aaaaaaa".to_string(), "Alpha beta gamma.".to_string()),
        ("tst_02_001_bbbbbbb".to_string(), "Delta epsilon.".to_string()),
        ("oth_01_001_ccccccc".to_string(), "Unrelated content.".to_string()),
    ]);
    index.save(&artifact).expect("save");

    let loaded = LexicalIndex::load(&artifact).expect("load");
    assert_eq!(loaded.len(), 3);
    assert_eq!(loaded.search("alpha", 5, Some("tst")).len(), 2);

    let survivors: Vec<(String, String)> = loaded
        .entries()
        .filter(|(id, _)| !id.starts_with("tst_"))
        .map(|(id, text)| (id.to_string(), text.to_string()))
        .collect();
    let mut rebuilt = LexicalIndex::new();
    rebuilt.build(&survivors);
    rebuilt.save(&artifact).expect("re-save");

    let reloaded = LexicalIndex::load(&artifact).expect("reload");
    assert_eq!(reloaded.len(), 1);
    assert!(reloaded.search("alpha", 5, Some("tst")).is_empty());
}

#[test]
fn test_conversation_end_to_end_chunking() {
    let dir = TempDir::new().expect("tempdir");
    let mut transcript = String::new();
    for i in 0..20 {
        transcript.push_str(&format!(
            "[00:{i:02}:00] Speaker{}: This is turn number {i} with several words in it.\n",
            i % 3
        ));
    }
    let path = write_source(&dir, "chat.txt", &transcript);

    let parser = parser_for(DocType::Conversation, &path, "cnv", None).expect("parser");
    let units = parser.parse().expect("parse");
    assert_eq!(units.len(), 20);

    let codec = TokenCodec::new().expect("codec");
    let chunks = parser
        .chunk(
            &units,
            &codec,
            &ChunkParams::defaults_for(DocType::Conversation),
        )
        .expect("chunk");
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.metadata.turn_start.is_some());
        assert!(chunk.metadata.speakers.is_some());
        assert!(chunk.text.contains("): "));
    }
}

// ==================== CLI tests ====================

fn docdex_cmd(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("docdex").expect("binary");
    cmd.arg("--data-dir").arg(data_dir.path());
    cmd.env_remove("DOCDEX_DATA_DIR");
    cmd
}

#[test]
fn test_cli_help() {
    Command::cargo_bin("docdex")
        .expect("binary")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("search"));
}

#[test]
fn test_cli_list_empty() {
    let dir = TempDir::new().expect("tempdir");
    docdex_cmd(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No documents"));
}

#[test]
fn test_cli_status() {
    let dir = TempDir::new().expect("tempdir");
    docdex_cmd(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Documents:       0"));
}

#[test]
fn test_cli_ingest_rejects_bad_slug() {
    let dir = TempDir::new().expect("tempdir");
    let source = write_source(&dir, "doc.txt", "content");
    docdex_cmd(&dir)
        .args(["ingest", "BAD SLUG"])
        .arg(&source)
        .arg("Title")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid"));
}

#[test]
fn test_cli_ingest_rejects_missing_file() {
    let dir = TempDir::new().expect("tempdir");
    docdex_cmd(&dir)
        .args(["ingest", "doc", "/no/such/file.txt", "Title"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_cli_ingest_rejects_unknown_doc_type() {
    let dir = TempDir::new().expect("tempdir");
    let source = write_source(&dir, "doc.txt", "content");
    docdex_cmd(&dir)
        .args(["ingest", "doc"])
        .arg(&source)
        .args(["Title", "--doc-type", "poem"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown document type"));
}

#[test]
fn test_cli_delete_unknown_document() {
    let dir = TempDir::new().expect("tempdir");
    docdex_cmd(&dir)
        .args(["delete", "ghost", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document not found"));
}

#[test]
fn test_cli_summary_unknown_document() {
    let dir = TempDir::new().expect("tempdir");
    docdex_cmd(&dir)
        .args(["summary", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("document not found"));
}

#[test]
fn test_cli_json_error_goes_to_stdout() {
    let dir = TempDir::new().expect("tempdir");
    docdex_cmd(&dir)
        .args(["--format", "json", "summary", "ghost"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"error\""));
}
