//! Source reading utilities.
//!
//! Text sources are decoded tolerantly (UTF-8 with replacement), using
//! memory mapping for large files. PDF sources go through `pdf-extract`,
//! which concatenates page text with newlines.

mod reader;

pub use reader::SourceReader;

use crate::error::{IoError, Result};
use std::path::Path;

/// Reads a document source, dispatching on the file extension.
///
/// `.pdf` files are extracted page-wise; everything else is treated as
/// text and decoded with UTF-8 replacement.
///
/// # Errors
///
/// Returns an error if the file is missing or extraction fails.
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        pdf_extract::extract_text(path).map_err(|e| {
            IoError::ReadFailed {
                path: path.to_string_lossy().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    } else {
        SourceReader::open(path)?.read_lossy()
    }
}

/// Writes `bytes` to `path` atomically (write-to-tempfile + rename).
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::WriteFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| IoError::WriteFailed {
        path: tmp.to_string_lossy().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::rename(&tmp, path).map_err(|e| {
        IoError::WriteFailed {
            path: path.to_string_lossy().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_source_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, "hello source").unwrap();
        assert_eq!(read_source(&path).unwrap(), "hello source");
    }

    #[test]
    fn test_read_source_missing() {
        let result = read_source("/nonexistent/doc.txt");
        assert!(result.is_err());
    }

    #[test]
    fn test_read_source_invalid_utf8_is_tolerant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        std::fs::write(&path, [b'o', b'k', 0xff, b'!']).unwrap();
        let text = read_source(&path).unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.contains('\u{fffd}'));
    }

    #[test]
    fn test_write_atomic_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("artifact.bin");
        write_atomic(&path, b"payload").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
        // No stray temp file left behind
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_write_atomic_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.bin");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }
}
