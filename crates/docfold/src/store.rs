// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Persisted key/value content store.
//!
//! [`ContentStore`] maps a string key (a content hash) to a small JSON
//! record, backed by a single JSON file. The file is loaded lazily on the
//! first lookup and rewritten in full on every insert; there is no
//! incremental append format. A missing or corrupt store file is treated as
//! empty, never as an error.
//!
//! The module resolver uses a `ContentStore<ManifestEntry>` keyed by
//! module-set hash as its do-not-rebuild manifest.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// A persisted mapping from string keys to JSON records.
#[derive(Debug)]
pub struct ContentStore<T> {
    path: PathBuf,
    entries: Option<BTreeMap<String, T>>,
}

impl<T> ContentStore<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Creates a store backed by the given file path.
    ///
    /// Nothing is read until the first [`get`](Self::get) or
    /// [`put`](Self::put).
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: None,
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a record by key, loading the store file if necessary.
    pub fn get(&mut self, key: &str) -> Option<T> {
        self.entries().get(key).cloned()
    }

    /// Returns true if a record exists for the key.
    pub fn contains(&mut self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    /// Inserts a record and rewrites the store file.
    pub fn put(&mut self, key: &str, value: T) -> Result<()> {
        self.entries().insert(key.to_string(), value);
        let json = serde_json::to_string_pretty(self.entries())?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Number of records currently in the store.
    pub fn len(&mut self) -> usize {
        self.entries().len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&mut self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&mut self) -> &mut BTreeMap<String, T> {
        if self.entries.is_none() {
            self.entries = Some(Self::load(&self.path));
        }
        self.entries.get_or_insert_with(BTreeMap::new)
    }

    // Missing file and parse failures both load as empty: the store is a
    // do-not-rebuild signal, so losing it only costs recomputation.
    fn load(path: &Path) -> BTreeMap<String, T> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return BTreeMap::new(),
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "discarding unreadable store");
                BTreeMap::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        css: bool,
        modules: Vec<String>,
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let mut store: ContentStore<Record> = ContentStore::new(dir.path().join("manifest.json"));
        assert!(store.get("abc").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn put_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut store = ContentStore::new(&path);
        let record = Record {
            css: true,
            modules: vec!["flex".to_string()],
        };
        store.put("abc", record.clone()).unwrap();
        assert_eq!(store.get("abc"), Some(record.clone()));

        // A fresh store instance sees the persisted record.
        let mut reopened: ContentStore<Record> = ContentStore::new(&path);
        assert_eq!(reopened.get("abc"), Some(record));
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        fs::write(&path, "{ not json").unwrap();
        let mut store: ContentStore<Record> = ContentStore::new(&path);
        assert!(store.get("abc").is_none());
    }

    #[test]
    fn put_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deep").join("manifest.json");
        let mut store = ContentStore::new(&path);
        store
            .put(
                "k",
                Record {
                    css: false,
                    modules: vec![],
                },
            )
            .unwrap();
        assert!(path.is_file());
    }
}
