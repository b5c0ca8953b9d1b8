//! In-process storage backend.

use super::KeyValueStore;
use crate::errors::StorageError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// A [`KeyValueStore`] backed by a `HashMap`, with write-failure injection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the raw payload under `namespace`.
    pub fn get(&self, namespace: &str) -> Option<String> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(namespace)
            .cloned()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, namespace: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get(namespace))
    }

    fn write(&self, namespace: &str, payload: &str) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!(
                "write to '{}' rejected",
                namespace
            )));
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(namespace.to_string(), payload.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, namespace: &str) -> Result<(), StorageError> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(namespace);
        Ok(())
    }
}
