//! Target file I/O: verbatim UTF-8 reads and atomic writes.
//!
//! The applier never touches the filesystem; this module is the caller side.
//! A [`TargetFile`] remembers the hash of what it read so that the write can
//! refuse to clobber a file that changed underneath the run.
//!
//! Writes go to a temp file in the target's directory which is then renamed
//! over the target. The temp file is removed on every early-return path, so a
//! failed write never leaves the target half-written.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

// ============================================================================
// Content Hash
// ============================================================================

/// SHA-256 of file content, stored as a hex string for JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 of the given bytes.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from reading or writing a target file.
#[derive(Debug, Error)]
pub enum FileError {
    /// The target does not exist.
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    /// The target exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The target is not valid UTF-8.
    #[error("{} is not valid UTF-8", .path.display())]
    NotUtf8 { path: PathBuf },

    /// The target changed between read and write.
    #[error(
        "{} was modified during the run (expected {expected}, found {actual})",
        .path.display()
    )]
    Modified {
        path: PathBuf,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Writing the new content failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    /// Path of the file the error concerns.
    pub fn path(&self) -> &Path {
        match self {
            FileError::NotFound { path }
            | FileError::Read { path, .. }
            | FileError::NotUtf8 { path }
            | FileError::Modified { path, .. }
            | FileError::Write { path, .. } => path,
        }
    }
}

// ============================================================================
// Target File
// ============================================================================

/// A target file's path and the content read from it.
#[derive(Debug, Clone)]
pub struct TargetFile {
    path: PathBuf,
    content: String,
    hash: ContentHash,
}

impl TargetFile {
    /// Read the file verbatim. No newline or encoding normalization happens.
    pub fn read(path: impl Into<PathBuf>) -> Result<Self, FileError> {
        let path = path.into();
        let bytes = read_bytes(&path)?;
        let hash = ContentHash::compute(&bytes);
        let content = String::from_utf8(bytes).map_err(|_| FileError::NotUtf8 {
            path: path.clone(),
        })?;
        tracing::debug!("read {} ({} bytes)", path.display(), content.len());
        Ok(TargetFile {
            path,
            content,
            hash,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Hash of the content as read.
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Replace the file's content atomically.
    ///
    /// Fails with [`FileError::Modified`] if the file on disk no longer
    /// matches what [`TargetFile::read`] saw.
    pub fn write(&self, new_content: &str) -> Result<(), FileError> {
        let current = ContentHash::compute(&read_bytes(&self.path)?);
        if current != self.hash {
            return Err(FileError::Modified {
                path: self.path.clone(),
                expected: self.hash.clone(),
                actual: current,
            });
        }
        write_atomic(&self.path, new_content.as_bytes())?;
        tracing::info!("wrote {} ({} bytes)", self.path.display(), new_content.len());
        Ok(())
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, FileError> {
    fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => FileError::NotFound {
            path: path.to_path_buf(),
        },
        _ => FileError::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}

/// Write `content` to `path` via temp file + fsync + rename.
///
/// The existing file's permissions are carried over to the replacement.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), FileError> {
    let to_write_error = |source: io::Error| FileError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // dropped (and deleted) on any early return below
    let mut temp = NamedTempFile::new_in(dir).map_err(to_write_error)?;
    temp.write_all(content).map_err(to_write_error)?;
    temp.as_file().sync_all().map_err(to_write_error)?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(temp.path(), metadata.permissions()).map_err(to_write_error)?;
    }

    temp.persist(path).map_err(|e| to_write_error(e.error))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
