//! Ordered index of the files tracked by one watch.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// One matching file currently believed present on disk.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TrackedFile {
    /// Modification time observed when the entry was last updated. Ties
    /// are broken by path, so eviction order is deterministic.
    pub sort_key: DateTime<Utc>,

    /// Full path to the file.
    pub path: PathBuf,
}

/// Per-watch record of matching files, ordered oldest first.
///
/// This is an eventually consistent cache of the directory contents, not a
/// guaranteed mirror: between a filesystem change and delivery of the
/// matching event the index may briefly diverge from disk. All operations
/// are O(log n) in the number of tracked files.
#[derive(Debug, Default)]
pub struct FileIndex {
    by_age: BTreeSet<TrackedFile>,
    by_path: HashMap<PathBuf, DateTime<Utc>>,
}

impl FileIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-initialize from a directory scan, replacing any previous
    /// contents.
    pub fn seed(&mut self, entries: impl IntoIterator<Item = (PathBuf, DateTime<Utc>)>) {
        self.by_age.clear();
        self.by_path.clear();
        for (path, sort_key) in entries {
            self.on_created(path, sort_key);
        }
    }

    /// Record a file as present. A duplicate path replaces the stored
    /// sort key instead of double-counting.
    pub fn on_created(&mut self, path: PathBuf, sort_key: DateTime<Utc>) {
        if let Some(old_key) = self.by_path.insert(path.clone(), sort_key) {
            self.by_age.remove(&TrackedFile {
                sort_key: old_key,
                path: path.clone(),
            });
        }
        self.by_age.insert(TrackedFile { sort_key, path });
    }

    /// Drop a file if present, returning whether the index changed.
    /// Removing an absent path is a no-op: Removed events race with
    /// eviction's own deletes.
    pub fn on_removed(&mut self, path: &Path) -> bool {
        match self.by_path.remove(path) {
            Some(sort_key) => {
                self.by_age.remove(&TrackedFile {
                    sort_key,
                    path: path.to_path_buf(),
                });
                true
            }
            None => false,
        }
    }

    /// Move a tracked file to a new path, preserving its original sort
    /// key. Returns false when `from` was not tracked.
    pub fn rename(&mut self, from: &Path, to: PathBuf) -> bool {
        match self.by_path.remove(from) {
            Some(sort_key) => {
                self.by_age.remove(&TrackedFile {
                    sort_key,
                    path: from.to_path_buf(),
                });
                self.on_created(to, sort_key);
                true
            }
            None => false,
        }
    }

    /// Up to `n` entries with the smallest sort keys, ties broken by
    /// lexicographic path order.
    pub fn oldest(&self, n: usize) -> Vec<TrackedFile> {
        self.by_age.iter().take(n).cloned().collect()
    }

    /// Current count of tracked files.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Whether no files are tracked.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Whether a path is tracked.
    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Sort key recorded for a path, if tracked.
    pub fn sort_key(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.by_path.get(path).copied()
    }
}
