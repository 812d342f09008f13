mod dirty;
mod memory;
pub mod play_cache;
pub mod scope;
pub mod sync;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{dao::local_store::LocalStore, dao::play_store::PlayStore, error::ServiceError};

pub use self::play_cache::{CacheError, CachedPlay, PlayCache, WriteOutcome};
pub use self::scope::{ANONYMOUS_SCOPE, Identity, PlayKey, resolve_scope};
pub use self::sync::SyncError;

pub type SharedState = Arc<AppState>;

/// Session state shared by every request: the play cache and the remote store handle.
pub struct AppState {
    plays: PlayCache,
    play_store: RwLock<Option<Arc<dyn PlayStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a remote store is installed.
    pub fn new(local: LocalStore) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            plays: PlayCache::new(local),
            play_store: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// Play cache of this session.
    pub fn plays(&self) -> &PlayCache {
        &self.plays
    }

    /// Obtain a handle to the current remote store, if one is installed.
    pub async fn play_store(&self) -> Option<Arc<dyn PlayStore>> {
        let guard = self.play_store.read().await;
        guard.as_ref().cloned()
    }

    /// Remote store, or [`ServiceError::Degraded`] when none is connected.
    pub async fn require_play_store(&self) -> Result<Arc<dyn PlayStore>, ServiceError> {
        self.play_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new remote store implementation and leave degraded mode.
    pub async fn set_play_store(&self, store: Arc<dyn PlayStore>) {
        {
            let mut guard = self.play_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current remote store and enter degraded mode.
    pub async fn clear_play_store(&self) {
        {
            let mut guard = self.play_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}
