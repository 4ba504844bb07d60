// SPDX-License-Identifier: Apache-2.0

use super::{join_path, validate_relative_path, DirEntry, DistroStore, EntryKind, StoreError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory tree with per-path failure injection.
///
/// Adding a file creates its parent directories. A path registered with
/// [`FakeStore::fail_reads`] fails every `read_dir`/`read_file` on it; one
/// registered with [`FakeStore::fail_reads_after`] succeeds `n` times first.
#[derive(Default)]
pub struct FakeStore {
    pub files: Mutex<BTreeMap<String, Vec<u8>>>,
    pub dirs: Mutex<BTreeSet<String>>,
    pub failures: Mutex<HashMap<String, u64>>,
    pub read_calls: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(parent, _)| parent)
}

impl FakeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: &str) {
        let mut dirs = lock(&self.dirs);
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = join_path(&current, segment);
            dirs.insert(current.clone());
        }
    }

    pub fn add_file(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.add_dir(parent_of(path));
        lock(&self.files).insert(path.to_string(), bytes.into());
    }

    /// Removes a file or a whole subtree.
    pub fn remove(&self, path: &str) {
        let prefix = format!("{path}/");
        lock(&self.files).retain(|p, _| p != path && !p.starts_with(&prefix));
        lock(&self.dirs).retain(|p| p != path && !p.starts_with(&prefix));
    }

    pub fn fail_reads(&self, path: &str) {
        self.fail_reads_after(path, 0);
    }

    pub fn fail_reads_after(&self, path: &str, successes: u64) {
        lock(&self.failures).insert(path.to_string(), successes);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    fn check_failure(&self, path: &str) -> Result<(), StoreError> {
        let mut failures = lock(&self.failures);
        match failures.get_mut(path) {
            None => Ok(()),
            Some(0) => Err(StoreError::Io(format!("injected failure: {path}"))),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
        }
    }

    fn dir_exists(&self, path: &str) -> bool {
        path.is_empty() || lock(&self.dirs).contains(path)
    }
}

impl DistroStore for FakeStore {
    fn backend_tag(&self) -> &'static str {
        "fake"
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, StoreError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        validate_relative_path(path)?;
        self.check_failure(path)?;
        if !self.dir_exists(path) {
            return Err(StoreError::NotFound(path.to_string()));
        }
        let mut out: BTreeMap<String, EntryKind> = BTreeMap::new();
        for dir in lock(&self.dirs).iter() {
            if parent_of(dir) == path && dir.as_str() != path {
                let name = dir.rsplit('/').next().unwrap_or(dir);
                out.insert(name.to_string(), EntryKind::Directory);
            }
        }
        for file in lock(&self.files).keys() {
            if parent_of(file) == path {
                let name = file.rsplit('/').next().unwrap_or(file);
                out.insert(name.to_string(), EntryKind::File);
            }
        }
        Ok(out
            .into_iter()
            .map(|(name, kind)| DirEntry { name, kind })
            .collect())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.read_calls.fetch_add(1, Ordering::Relaxed);
        validate_relative_path(path)?;
        self.check_failure(path)?;
        if let Some(bytes) = lock(&self.files).get(path) {
            return Ok(bytes.clone());
        }
        if self.dir_exists(path) {
            return Err(StoreError::IsDirectory(path.to_string()));
        }
        Err(StoreError::NotFound(path.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_reflects_added_paths() {
        let store = FakeStore::new();
        store.add_file("alpine/distro.yaml", "name: Alpine");
        store.add_dir("alpine/3.18.4/x86_64");

        let root = store.read_dir("").expect("root");
        assert_eq!(root.len(), 1);
        assert!(root[0].is_dir());

        let family = store.read_dir("alpine").expect("family");
        let names: Vec<_> = family.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["3.18.4", "distro.yaml"]);
        assert!(family[1].is_file());
    }

    #[test]
    fn injected_failures_count_down() {
        let store = FakeStore::new();
        store.add_dir("alpine");
        store.fail_reads_after("alpine", 1);
        assert!(store.read_dir("alpine").is_ok());
        assert!(store.read_dir("alpine").is_err());
        store.clear_failures();
        assert!(store.read_dir("alpine").is_ok());
    }

    #[test]
    fn remove_drops_subtree() {
        let store = FakeStore::new();
        store.add_file("alpine/3.18.4/x86_64/vmlinuz-lts", "k");
        store.remove("alpine/3.18.4");
        assert!(store.read_dir("alpine").expect("family").is_empty());
        assert!(matches!(
            store.read_file("alpine/3.18.4/x86_64/vmlinuz-lts"),
            Err(StoreError::NotFound(_))
        ));
    }
}
