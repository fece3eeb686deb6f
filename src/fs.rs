//! Path-keyed file stores backing the local and remote file system mocks.
//!
//! A store is a flat map from path to [`FileRecord`]; there are no real
//! directory-tree semantics beyond prefix filtering in [`FileStore::list`].
//! Records are created on registration or first committed write, overwritten
//! on write, and never implicitly deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default permission bits for records created without explicit metadata.
const DEFAULT_PERMISSIONS: u32 = 0o644;

/// Stat-style attributes derived from a [`FileRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttributes {
    /// Content length in bytes.
    pub size: u64,
    /// Unix permission bits.
    pub permissions: u32,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Content plus metadata for one mocked file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// File content; always defined, possibly empty.
    pub content: Vec<u8>,
    /// Unix permission bits.
    pub permissions: u32,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

impl FileRecord {
    /// Create a record with the given content and default metadata.
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            permissions: DEFAULT_PERMISSIONS,
            modified: Utc::now(),
        }
    }

    /// Create an empty record.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Override the permission bits.
    #[must_use]
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Override the modification time.
    #[must_use]
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }

    /// Derived stat attributes.
    pub fn attributes(&self) -> FileAttributes {
        FileAttributes {
            size: self.content.len() as u64,
            permissions: self.permissions,
            modified: self.modified,
        }
    }

    /// Content decoded as UTF-8 (lossy).
    pub fn content_text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

impl From<&str> for FileRecord {
    fn from(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }
}

impl From<String> for FileRecord {
    fn from(content: String) -> Self {
        Self::new(content.into_bytes())
    }
}

/// One path-keyed store (the local namespace, or one host's remote namespace).
#[derive(Debug, Default)]
pub(crate) struct FileStore {
    files: HashMap<String, FileRecord>,
}

impl FileStore {
    /// Insert or overwrite the record at `path`.
    pub(crate) fn insert(&mut self, path: impl Into<String>, record: FileRecord) {
        self.files.insert(path.into(), record);
    }

    pub(crate) fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub(crate) fn remove(&mut self, path: &str) -> Option<FileRecord> {
        self.files.remove(path)
    }

    /// Sorted relative paths of records under `prefix`.
    ///
    /// A prefix of `/tmp` matches `/tmp/a.txt` (yielding `a.txt`) but not
    /// `/tmpfile`; an empty prefix or `/` matches everything. Nested records
    /// keep their remaining path (`/tmp/d/b.txt` under `/tmp` is `d/b.txt`).
    pub(crate) fn list(&self, prefix: &str) -> Vec<String> {
        let normalized = if prefix.is_empty() || prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(&normalized))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    pub(crate) fn clear(&mut self) {
        self.files.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_attributes_derive_size() {
        let record = FileRecord::new("hello").with_permissions(0o600);
        let attrs = record.attributes();
        assert_eq!(attrs.size, 5);
        assert_eq!(attrs.permissions, 0o600);
        assert_eq!(attrs.modified, record.modified);
    }

    #[test]
    fn test_empty_record_has_defined_content() {
        let record = FileRecord::empty();
        assert!(record.content.is_empty());
        assert_eq!(record.attributes().size, 0);
    }

    #[test]
    fn test_insert_overwrites() {
        let mut store = FileStore::default();
        store.insert("/tmp/a", FileRecord::from("one"));
        store.insert("/tmp/a", FileRecord::from("two"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("/tmp/a").unwrap().content_text(), "two");
    }

    #[test]
    fn test_list_filters_by_prefix() {
        let mut store = FileStore::default();
        store.insert("/tmp/a.txt", FileRecord::empty());
        store.insert("/tmp/d/b.txt", FileRecord::empty());
        store.insert("/var/log/syslog", FileRecord::empty());
        store.insert("/tmpfile", FileRecord::empty());

        assert_eq!(store.list("/tmp"), vec!["a.txt", "d/b.txt"]);
        assert_eq!(store.list("/var/log"), vec!["syslog"]);
        assert!(store.list("/opt").is_empty());
    }

    #[test]
    fn test_list_trailing_slash_equivalent() {
        let mut store = FileStore::default();
        store.insert("/tmp/a.txt", FileRecord::empty());
        assert_eq!(store.list("/tmp"), store.list("/tmp/"));
    }
}
