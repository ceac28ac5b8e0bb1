#![forbid(unsafe_code)]

//! In-memory named-blob store.
//!
//! The engine persists its durable state (device certificate, license
//! records, usage reports) through the [`Storage`] trait. This implementation
//! keeps everything in one lock-protected map; a deployment that needs disk
//! persistence backs the same trait differently.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tessera_core::Storage;
use tracing::{debug, trace};

/// Lock-protected in-memory [`Storage`] implementation.
///
/// One distinguished name conventionally holds the device certificate and may
/// be seeded via [`preload_file`](MemoryStorage::preload_file) before the
/// engine is constructed.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed one entry before the engine begins issuing storage calls.
    ///
    /// The caller must guarantee no engine storage traffic is in flight;
    /// this is a pre-construction seam, not a runtime write path.
    pub fn preload_file(&self, name: impl Into<String>, content: Bytes) {
        let name = name.into();
        debug!(name = %name, bytes = content.len(), "preload file");
        self.files.lock().insert(name, content);
    }

    /// Drop every entry. Test/reset helper, equivalent to `remove("")`.
    pub fn clear(&self) {
        self.files.lock().clear();
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, name: &str) -> Option<Bytes> {
        let files = self.files.lock();
        let entry = files.get(name).cloned();
        trace!(name, hit = entry.is_some(), "storage read");
        entry
    }

    fn write(&self, name: &str, data: Bytes) {
        trace!(name, bytes = data.len(), "storage write");
        self.files.lock().insert(name.to_owned(), data);
    }

    fn exists(&self, name: &str) -> bool {
        self.files.lock().contains_key(name)
    }

    fn remove(&self, name: &str) {
        let mut files = self.files.lock();
        if name.is_empty() {
            // Empty name wipes the whole store (the engine's delete-all-files).
            debug!(entries = files.len(), "storage wildcard remove");
            files.clear();
        } else {
            trace!(name, "storage remove");
            files.remove(name);
        }
    }

    fn size(&self, name: &str) -> i64 {
        match self.files.lock().get(name) {
            Some(data) => i64::try_from(data.len()).unwrap_or(i64::MAX),
            None => -1,
        }
    }

    fn list(&self) -> Vec<String> {
        self.files.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn store_with(entries: &[(&str, &[u8])]) -> MemoryStorage {
        let store = MemoryStorage::new();
        for (name, data) in entries {
            store.write(name, Bytes::copy_from_slice(data));
        }
        store
    }

    #[test]
    fn read_absent_is_none() {
        let store = MemoryStorage::new();
        assert_eq!(store.read("missing"), None);
    }

    #[test]
    fn write_then_read_roundtrips() {
        let store = MemoryStorage::new();
        store.write("cert.bin", Bytes::from_static(b"device-cert"));
        assert_eq!(store.read("cert.bin").unwrap().as_ref(), b"device-cert");
        assert!(store.exists("cert.bin"));
    }

    #[test]
    fn write_overwrites_existing() {
        let store = store_with(&[("a", b"old")]);
        store.write("a", Bytes::from_static(b"new"));
        assert_eq!(store.read("a").unwrap().as_ref(), b"new");
        assert_eq!(store.len(), 1);
    }

    #[rstest]
    #[case("present", 7)]
    #[case("missing", -1)]
    fn size_reports_length_or_sentinel(#[case] name: &str, #[case] expected: i64) {
        let store = store_with(&[("present", b"exactly")]);
        assert_eq!(store.size(name), expected);
    }

    #[test]
    fn remove_single_name_leaves_others() {
        let store = store_with(&[("x", b"1"), ("y", b"2")]);
        store.remove("x");
        assert!(!store.exists("x"));
        assert!(store.exists("y"));
    }

    #[test]
    fn remove_empty_name_clears_everything() {
        let store = store_with(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        store.remove("");
        assert!(store.list().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn remove_absent_name_is_noop() {
        let store = store_with(&[("a", b"1")]);
        store.remove("nope");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_returns_all_names() {
        let store = store_with(&[("a", b"1"), ("b", b"2")]);
        let mut names = store.list();
        names.sort();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn preload_seeds_entry() {
        let store = MemoryStorage::new();
        store.preload_file("cert.bin", Bytes::from_static(b"preloaded"));
        assert_eq!(store.size("cert.bin"), 9);
    }
}
