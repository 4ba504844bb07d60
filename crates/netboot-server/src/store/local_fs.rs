// SPDX-License-Identifier: Apache-2.0

use super::{validate_relative_path, DirEntry, DistroStore, EntryKind, FileSource, StoreError};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        validate_relative_path(path)?;
        if path.is_empty() {
            return Ok(self.root.clone());
        }
        Ok(self.root.join(path))
    }

    // Symlinks inside the tree may not point outside of it.
    fn ensure_within_root(&self, full: &Path) -> Result<PathBuf, StoreError> {
        let root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        let canonical = full.canonicalize().map_err(|e| map_io(full, e))?;
        if !canonical.starts_with(&root) {
            return Err(StoreError::InvalidPath(
                "path traversal blocked".to_string(),
            ));
        }
        Ok(canonical)
    }

    fn regular_file(&self, path: &str) -> Result<(PathBuf, u64), StoreError> {
        let full = self.resolve(path)?;
        let canonical = self.ensure_within_root(&full)?;
        let meta = fs::metadata(&canonical).map_err(|e| map_io(&full, e))?;
        if meta.is_dir() {
            return Err(StoreError::IsDirectory(path.to_string()));
        }
        Ok((canonical, meta.len()))
    }
}

fn map_io(path: &Path, err: std::io::Error) -> StoreError {
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound(path.display().to_string()),
        _ => StoreError::Io(format!("{}: {err}", path.display())),
    }
}

impl DistroStore for LocalFsStore {
    fn backend_tag(&self) -> &'static str {
        "local"
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        let full = self.resolve(path)?;
        let mut out = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| map_io(&full, e))? {
            let entry = entry.map_err(|e| map_io(&full, e))?;
            let file_type = entry.file_type().map_err(|e| map_io(&entry.path(), e))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            out.push(DirEntry { name, kind });
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let (full, _) = self.regular_file(path)?;
        fs::read(&full).map_err(|e| map_io(&full, e))
    }

    fn open_file(&self, path: &str) -> Result<FileSource, StoreError> {
        let (path, len) = self.regular_file(path)?;
        Ok(FileSource::Disk { path, len })
    }
}
