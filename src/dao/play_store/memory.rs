//! In-process [`PlayStore`] used for ephemeral sessions and tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::dao::{
    models::OwnedPlayRecord,
    play_store::PlayStore,
    storage::{StorageError, StorageResult},
};

#[derive(Debug, thiserror::Error)]
#[error("memory store is offline")]
struct Offline;

#[derive(Default)]
struct MemoryInner {
    documents: DashMap<(String, String), Value>,
    offline: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

/// Remote store kept in memory, with call counters and an offline switch.
#[derive(Clone, Default)]
pub struct MemoryPlayStore {
    inner: Arc<MemoryInner>,
}

impl MemoryPlayStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw document, bypassing the typed write path.
    pub fn insert_raw(&self, collection: &str, key: &str, document: Value) {
        self.inner
            .documents
            .insert((collection.to_string(), key.to_string()), document);
    }

    /// Raw document currently stored under `key`.
    pub fn raw(&self, collection: &str, key: &str) -> Option<Value> {
        self.inner
            .documents
            .get(&(collection.to_string(), key.to_string()))
            .map(|doc| doc.value().clone())
    }

    /// Make every subsequent call fail until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of document reads served so far.
    pub fn get_count(&self) -> usize {
        self.inner.gets.load(Ordering::SeqCst)
    }

    /// Number of document writes accepted so far.
    pub fn set_count(&self) -> usize {
        self.inner.sets.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable("memory store offline".into(), Offline))
        } else {
            Ok(())
        }
    }
}

impl PlayStore for MemoryPlayStore {
    fn get(
        &self,
        collection: &'static str,
        key: String,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.gets.fetch_add(1, Ordering::SeqCst);
            store.ensure_online()?;
            Ok(store.raw(collection, &key))
        })
    }

    fn set(
        &self,
        collection: &'static str,
        key: String,
        document: OwnedPlayRecord,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.sets.fetch_add(1, Ordering::SeqCst);
            store.ensure_online()?;
            let value = serde_json::to_value(&document)
                .map_err(|source| StorageError::unavailable(key.clone(), source))?;
            store
                .inner
                .documents
                .insert((collection.to_string(), key), value);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}
