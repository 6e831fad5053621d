//! File reading with memory mapping support.
//!
//! Small files are read directly; large files are memory mapped. Decoding
//! is always tolerant: invalid UTF-8 is replaced rather than rejected,
//! since public-domain book sources routinely carry stray bytes.

// Memory mapping requires unsafe but is well-documented and safe for read-only access
#![allow(unsafe_code)]

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Threshold for using memory mapping (1MB).
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Maximum file size to read into memory (1GB).
const MAX_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Source file reader.
///
/// Chooses the reading strategy based on file size:
/// - Small files (< 1MB): read directly into memory
/// - Large files (>= 1MB): memory mapped
///
/// # Examples
///
/// ```no_run
/// use docdex::io::SourceReader;
///
/// let reader = SourceReader::open("the_odyssey.txt").unwrap();
/// let content = reader.read_lossy().unwrap();
/// ```
pub struct SourceReader {
    /// File handle.
    file: File,
    /// File size in bytes.
    size: u64,
    /// File path for error messages.
    path: String,
}

impl SourceReader {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be opened, or
    /// exceeds the 1GB size cap.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        if !path_ref.exists() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let file = File::open(path_ref).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let metadata = file.metadata().map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let size = metadata.len();
        if size > MAX_FILE_SIZE {
            return Err(IoError::ReadFailed {
                path: path_str,
                reason: format!("file too large: {size} bytes (max: {MAX_FILE_SIZE} bytes)"),
            }
            .into());
        }

        Ok(Self {
            file,
            size,
            path: path_str,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the file content with replacement decoding.
    ///
    /// Uses memory mapping for large files.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn read_lossy(&self) -> Result<String> {
        let bytes = if self.size >= MMAP_THRESHOLD {
            self.read_mmap()?
        } else {
            self.read_direct()?
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads using memory mapping.
    fn read_mmap(&self) -> Result<Vec<u8>> {
        // SAFETY: read-only mapping of a regular file we hold open
        let mmap = unsafe {
            Mmap::map(&self.file).map_err(|e| IoError::MmapFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?
        };
        Ok(mmap.to_vec())
    }

    /// Reads directly into memory.
    #[allow(clippy::cast_possible_truncation)]
    fn read_direct(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.size as usize);
        let mut file = &self.file;
        file.read_to_end(&mut bytes).map_err(|e| IoError::ReadFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_missing_file() {
        let result = SourceReader::open("/definitely/not/here.txt");
        assert!(result.is_err());
    }

    #[test]
    fn test_read_small_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.txt");
        std::fs::write(&path, "small content").unwrap();

        let reader = SourceReader::open(&path).unwrap();
        assert_eq!(reader.size(), 13);
        assert_eq!(reader.read_lossy().unwrap(), "small content");
    }

    #[test]
    fn test_read_large_file_mmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        let line = "The quick brown fox jumps over the lazy dog.\n";
        for _ in 0..30_000 {
            f.write_all(line.as_bytes()).unwrap();
        }
        drop(f);

        let reader = SourceReader::open(&path).unwrap();
        assert!(reader.size() >= MMAP_THRESHOLD);
        let content = reader.read_lossy().unwrap();
        assert!(content.starts_with("The quick"));
        assert!(content.ends_with("dog.\n"));
    }

    #[test]
    fn test_path_accessor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.txt");
        std::fs::write(&path, "x").unwrap();
        let reader = SourceReader::open(&path).unwrap();
        assert!(reader.path().ends_with("p.txt"));
    }
}
