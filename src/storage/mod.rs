//! Durable key-value storage for the engine's persisted records.
//!
//! Each store persists exactly one JSON document under a stable namespace
//! (`journal`, `session`, `settings`). Records are read once at start-up and
//! written after every mutation through a [`Persister`], which debounces
//! writes and never lets a storage failure reach the caller.
//!
//! # Module Structure
//!
//! - `sqlite`: the on-disk backend
//! - `memory`: an in-process backend for tests and embedding

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::errors::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// A backend holding one opaque payload per namespace.
pub trait KeyValueStore: Send + Sync {
    /// Reads the payload stored under `namespace`, if any.
    fn read(&self, namespace: &str) -> Result<Option<String>, StorageError>;

    /// Replaces the payload stored under `namespace`.
    fn write(&self, namespace: &str, payload: &str) -> Result<(), StorageError>;

    /// Deletes the payload stored under `namespace`. Missing is not an error.
    fn remove(&self, namespace: &str) -> Result<(), StorageError>;
}

/// Loads and decodes the record under `namespace`.
///
/// A missing record, an unreadable backend, or a record that no longer
/// decodes all yield `T::default()`; start-up is never blocked on storage.
pub fn load_or_default<T>(backend: &dyn KeyValueStore, namespace: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let payload = match backend.read(namespace) {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            debug!("No persisted record for '{}', starting empty", namespace);
            return T::default();
        }
        Err(e) => {
            warn!("Failed to read '{}' record, starting empty: {}", namespace, e);
            return T::default();
        }
    };

    match serde_json::from_str(&payload) {
        Ok(record) => record,
        Err(source) => {
            let error = StorageError::Malformed {
                namespace: namespace.to_string(),
                source,
            };
            warn!("Resetting corrupt record: {}", error);
            T::default()
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    generation: u64,
    payload: Option<String>,
}

struct PersisterInner {
    namespace: &'static str,
    backend: Arc<dyn KeyValueStore>,
    pending: Mutex<Pending>,
}

impl PersisterInner {
    /// Writes the pending payload if it is still the one scheduled as `generation`.
    fn flush_generation(&self, generation: Option<u64>) {
        let payload = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(generation) = generation {
                if pending.generation != generation {
                    // A newer snapshot owns the next write.
                    return;
                }
            }
            pending.payload.take()
        };

        if let Some(payload) = payload {
            match self.backend.write(self.namespace, &payload) {
                Ok(()) => debug!("Persisted '{}' ({} bytes)", self.namespace, payload.len()),
                Err(e) => warn!("Failed to persist '{}': {}", self.namespace, e),
            }
        }
    }
}

/// Schedules debounced, best-effort writes of one record.
///
/// [`schedule`](Persister::schedule) snapshots the record immediately, so the
/// in-memory state may keep changing while the write is pending. Inside a tokio
/// runtime the write happens on the blocking pool after the debounce window,
/// and only if no newer snapshot was scheduled meanwhile. Outside a runtime it
/// happens at once on the caller's thread.
pub struct Persister<T> {
    inner: Arc<PersisterInner>,
    debounce: Duration,
    _record: PhantomData<fn(&T)>,
}

impl<T: Serialize> Persister<T> {
    /// Creates a persister for `namespace` on `backend`.
    pub fn new(backend: Arc<dyn KeyValueStore>, namespace: &'static str, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(PersisterInner {
                namespace,
                backend,
                pending: Mutex::new(Pending::default()),
            }),
            debounce,
            _record: PhantomData,
        }
    }

    /// Snapshots `record` and schedules it to be written.
    pub fn schedule(&self, record: &T) {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialise '{}': {}", self.inner.namespace, e);
                return;
            }
        };

        let generation = {
            let mut pending = self.inner.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.generation += 1;
            pending.payload = Some(payload);
            pending.generation
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !self.debounce.is_zero() => {
                let inner = Arc::clone(&self.inner);
                let debounce = self.debounce;
                handle.spawn(async move {
                    tokio::time::sleep(debounce).await;
                    let namespace = inner.namespace;
                    // Backends block (rusqlite), so keep them off the async workers.
                    let write =
                        tokio::task::spawn_blocking(move || inner.flush_generation(Some(generation)));
                    if let Err(e) = write.await {
                        warn!("Debounced write of '{}' did not finish: {}", namespace, e);
                    }
                });
            }
            _ => self.inner.flush_generation(Some(generation)),
        }
    }

    /// Writes any pending snapshot now.
    pub fn flush(&self) {
        self.inner.flush_generation(None);
    }

    /// Whether a scheduled snapshot has not been written yet.
    pub fn has_pending(&self) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .payload
            .is_some()
    }

    /// Drops any pending snapshot and deletes the stored record.
    pub fn clear(&self) {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .payload = None;
        if let Err(e) = self.inner.backend.remove(self.inner.namespace) {
            warn!("Failed to remove '{}': {}", self.inner.namespace, e);
        }
    }
}
