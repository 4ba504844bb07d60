// SPDX-License-Identifier: Apache-2.0

//! Read-only view of the distribution tree.
//!
//! Paths are relative to the store root, `/`-separated, with `""` naming the
//! root itself.

pub mod fake;
pub mod local_fs;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    NotFound(String),
    IsDirectory(String),
    InvalidPath(String),
    Io(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "not found: {path}"),
            Self::IsDirectory(path) => write!(f, "is a directory: {path}"),
            Self::InvalidPath(msg) => write!(f, "invalid path: {msg}"),
            Self::Io(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// A file resolved for serving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Bytes(Vec<u8>),
    /// A regular file on local disk, streamed by the caller.
    Disk { path: PathBuf, len: u64 },
}

impl FileSource {
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::Bytes(bytes) => bytes.len() as u64,
            Self::Disk { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait DistroStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Entries of the directory at `path`, sorted by name.
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Resolves `path` for serving without buffering it when the backend
    /// can avoid it. Errors match `read_file`.
    fn open_file(&self, path: &str) -> Result<FileSource, StoreError> {
        self.read_file(path).map(FileSource::Bytes)
    }
}

#[must_use]
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Rejects paths that could leave the store root.
pub fn validate_relative_path(path: &str) -> Result<(), StoreError> {
    if path.starts_with('/') || path.contains('\\') || path.contains('\0') {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    if path.is_empty() {
        return Ok(());
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(StoreError::InvalidPath(path.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_root() {
        assert_eq!(join_path("", "alpine"), "alpine");
        assert_eq!(join_path("alpine/3.18.4", "x86_64"), "alpine/3.18.4/x86_64");
    }

    #[test]
    fn traversal_segments_are_rejected() {
        for bad in ["../etc", "a/../b", "/abs", "a//b", "a/./b", "a\\b", "a/"] {
            assert!(validate_relative_path(bad).is_err(), "{bad}");
        }
        for good in ["", "alpine", "alpine/3.18.4/x86_64/vmlinuz-lts", "a..b"] {
            assert!(validate_relative_path(good).is_ok(), "{good}");
        }
    }
}
