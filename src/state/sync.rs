//! Remote side of the play cache: read-through fetches and flushes.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        models::PlayRecord,
        play_store::{PLAYS_COLLECTION, PlayStore},
        storage::StorageError,
    },
    dto::validation::{ValidationReport, decode_legacy_play},
};

use super::{
    play_cache::{CacheError, CachedPlay, PlayCache},
    scope::{Identity, PlayKey, resolve_scope},
};

/// Failures of the operations that talk to the remote store.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Flush requested for a play without local changes.
    #[error("trying to write `{key}` to the remote store but the play is clean")]
    NothingToFlush { key: String },
    /// Flush requested for a play that is not cached.
    #[error("no cached play for `{key}`")]
    NoLocalValue { key: String },
    /// The remote document does not decode as a play.
    #[error("malformed play `{key}`: {report}")]
    MalformedPlay {
        key: String,
        report: ValidationReport,
    },
    /// The remote store failed.
    #[error("remote store request for `{key}` failed")]
    Remote {
        key: String,
        #[source]
        source: StorageError,
    },
    /// The local cache failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PlayCache {
    /// Cached play when there is one, otherwise what the remote store holds.
    ///
    /// A cached confirmed absence is returned as `None` without contacting
    /// the remote store, and signed-out visitors never have remote plays.
    pub async fn get_possibly_stale(
        &self,
        store: &dyn PlayStore,
        identity: Option<&Identity>,
        puzzle_id: &str,
    ) -> Result<Option<PlayRecord>, SyncError> {
        match self.get_cached(identity, puzzle_id)? {
            CachedPlay::Present(play) => Ok(Some(play)),
            CachedPlay::Absent => Ok(None),
            CachedPlay::Unknown => match identity {
                Some(identity) => self.fetch_and_cache(store, identity, puzzle_id).await,
                None => Ok(None),
            },
        }
    }

    /// Read `identity`'s play on `puzzle_id` from the remote store and cache it as clean.
    ///
    /// A missing document is cached as a confirmed absence.
    pub async fn fetch_and_cache(
        &self,
        store: &dyn PlayStore,
        identity: &Identity,
        puzzle_id: &str,
    ) -> Result<Option<PlayRecord>, SyncError> {
        let key = PlayKey::new(puzzle_id, identity);
        info!(collection = PLAYS_COLLECTION, %key, "getting play from the remote store");

        let document = store
            .get(PLAYS_COLLECTION, key.to_string())
            .await
            .map_err(|source| SyncError::Remote {
                key: key.to_string(),
                source,
            })?;

        let Some(document) = document else {
            debug!(%key, "no remote play; caching confirmed absence");
            self.write(Some(identity), puzzle_id, None, true)?;
            return Ok(None);
        };

        let play = match decode_legacy_play(document) {
            Ok(legacy) => legacy.into_current(),
            Err(report) => {
                error!(%key, %report, "malformed play in the remote store");
                return Err(SyncError::MalformedPlay {
                    key: key.into(),
                    report,
                });
            }
        };

        self.write(Some(identity), puzzle_id, Some(play.clone()), true)?;
        Ok(Some(play))
    }

    /// Send `identity`'s dirty play on `puzzle_id` to the remote store.
    ///
    /// The dirty mark is cleared before the request is issued so a write
    /// landing while the request is in flight marks the play dirty again.
    /// When the request fails the mark is restored: a rejected flush always
    /// leaves the play dirty.
    pub async fn flush(
        &self,
        store: &dyn PlayStore,
        identity: &Identity,
        puzzle_id: &str,
    ) -> Result<(), SyncError> {
        let key = PlayKey::new(puzzle_id, identity);

        let play = {
            let _gate = self.lock();
            if !self.dirty().is_dirty(&key) {
                return Err(SyncError::NothingToFlush { key: key.into() });
            }
            let plays = self.load_scope_locked(&resolve_scope(Some(identity)))?;
            let Some(Some(play)) = plays.get(puzzle_id).cloned() else {
                return Err(SyncError::NoLocalValue { key: key.into() });
            };
            self.dirty().unmark(&key);
            play
        };

        let document = play.into_owned(identity.uid());
        match store.set(PLAYS_COLLECTION, key.to_string(), document).await {
            Ok(()) => {
                debug!(%key, "flushed play to the remote store");
                Ok(())
            }
            Err(source) => {
                warn!(%key, error = %source, "flush failed; play stays dirty");
                self.dirty().mark(key.clone());
                Err(SyncError::Remote {
                    key: key.into(),
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::dao::{
        local_store::LocalStore,
        models::{OwnedPlayRecord, TITLE_PLACEHOLDER},
        play_store::memory::MemoryPlayStore,
    };

    fn play(title: &str, grid: &[&str]) -> PlayRecord {
        let mut payload = Map::new();
        payload.insert("g".into(), json!(grid));
        PlayRecord::new(title, payload)
    }

    fn setup() -> (PlayCache, MemoryPlayStore, Identity) {
        (
            PlayCache::new(LocalStore::in_memory()),
            MemoryPlayStore::new(),
            Identity::new("alice"),
        )
    }

    #[tokio::test]
    async fn anonymous_unknown_play_is_absent_without_remote_call() {
        let (cache, store, _) = setup();
        let found = cache.get_possibly_stale(&store, None, "p1").await.unwrap();
        assert_eq!(found, None);
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn cached_play_is_served_without_remote_call() {
        let (cache, store, alice) = setup();
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();

        let found = cache.get_possibly_stale(&store, Some(&alice), "p1").await.unwrap();
        assert_eq!(found, Some(play("Mini", &["A"])));
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn cached_absence_is_served_without_remote_call() {
        let (cache, store, alice) = setup();
        cache.write(Some(&alice), "p1", None, true).unwrap();

        let found = cache.get_possibly_stale(&store, Some(&alice), "p1").await.unwrap();
        assert_eq!(found, None);
        assert_eq!(store.get_count(), 0);
    }

    #[tokio::test]
    async fn missing_remote_play_is_cached_as_absent() {
        let (cache, store, alice) = setup();

        let found = cache.get_possibly_stale(&store, Some(&alice), "p1").await.unwrap();
        assert_eq!(found, None);
        assert_eq!(store.get_count(), 1);
        assert_eq!(cache.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Absent);

        cache.get_possibly_stale(&store, Some(&alice), "p1").await.unwrap();
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn legacy_remote_play_gets_placeholder_title_and_stays_clean() {
        let (cache, store, alice) = setup();
        store.insert_raw("p", "p1-alice", json!({"u": "alice", "g": ["A"], "f": false}));

        let found = cache
            .get_possibly_stale(&store, Some(&alice), "p1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.title, TITLE_PLACEHOLDER);
        assert_eq!(found.payload.get("g"), Some(&json!(["A"])));
        assert!(!found.payload.contains_key("u"));
        assert!(!cache.is_dirty(&alice, "p1"));
        assert_eq!(cache.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Present(found));
    }

    #[tokio::test]
    async fn remote_play_with_long_client_tag_is_cached() {
        let (cache, store, alice) = setup();
        let tag = "y".repeat(1500);
        store.insert_raw("p", "p1-alice", json!({"n": "Mini", "ua": tag.clone(), "g": ["A"]}));

        let found = cache
            .fetch_and_cache(&store, &alice, "p1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.client_tag, Some(tag));
        let reloaded = PlayCache::new(cache.local_store().clone());
        assert_eq!(reloaded.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Present(found));
    }

    #[tokio::test]
    async fn malformed_remote_play_is_rejected_and_not_cached() {
        let (cache, store, alice) = setup();
        store.insert_raw("p", "p1-alice", json!({"n": ["not", "a", "title"]}));

        let err = cache
            .fetch_and_cache(&store, &alice, "p1")
            .await
            .unwrap_err();
        match err {
            SyncError::MalformedPlay { key, report } => {
                assert_eq!(key, "p1-alice");
                assert_eq!(report.paths(), vec!["$/n"]);
            }
            other => panic!("expected malformed play, got {other:?}"),
        }
        assert_eq!(cache.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Unknown);
    }

    #[tokio::test]
    async fn flush_requires_a_dirty_play() {
        let (cache, store, alice) = setup();
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), true).unwrap();

        let err = cache.flush(&store, &alice, "p1").await.unwrap_err();
        assert!(matches!(err, SyncError::NothingToFlush { .. }));
        assert_eq!(store.set_count(), 0);
    }

    #[tokio::test]
    async fn flush_requires_a_cached_play() {
        let (cache, store, alice) = setup();
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();
        cache.reset();
        // Dirty without a cached value cannot happen through `write` alone.
        cache.dirty().mark(PlayKey::new("p2", &alice));

        let err = cache.flush(&store, &alice, "p2").await.unwrap_err();
        assert!(matches!(err, SyncError::NoLocalValue { .. }));
        assert_eq!(store.set_count(), 0);
        assert!(cache.is_dirty(&alice, "p2"));
    }

    #[tokio::test]
    async fn flush_sends_owned_play_and_cleans() {
        let (cache, store, alice) = setup();
        cache
            .write(Some(&alice), "p1", Some(play("Mini", &["A"]).with_client_tag("firefox")), false)
            .unwrap();

        cache.flush(&store, &alice, "p1").await.unwrap();

        assert!(!cache.is_dirty(&alice, "p1"));
        let sent: OwnedPlayRecord =
            serde_json::from_value(store.raw("p", "p1-alice").unwrap()).unwrap();
        assert_eq!(sent.owner_id, "alice");
        assert_eq!(sent.play, play("Mini", &["A"]).with_client_tag("firefox"));

        let err = cache.flush(&store, &alice, "p1").await.unwrap_err();
        assert!(matches!(err, SyncError::NothingToFlush { .. }));
        assert_eq!(store.set_count(), 1);
    }

    #[tokio::test]
    async fn failed_flush_leaves_play_dirty() {
        let (cache, store, alice) = setup();
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();
        store.set_offline(true);

        let err = cache.flush(&store, &alice, "p1").await.unwrap_err();
        assert!(matches!(err, SyncError::Remote { .. }));
        assert!(cache.is_dirty(&alice, "p1"));

        store.set_offline(false);
        cache.flush(&store, &alice, "p1").await.unwrap();
        assert!(!cache.is_dirty(&alice, "p1"));
        assert_eq!(store.raw("p", "p1-alice").and_then(|v| v.get("u").cloned()), Some(Value::from("alice")));
    }

    #[tokio::test]
    async fn write_after_flush_dirties_again() {
        let (cache, store, alice) = setup();
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();
        cache.flush(&store, &alice, "p1").await.unwrap();

        cache.write(Some(&alice), "p1", Some(play("Mini", &["A", "B"])), false).unwrap();
        assert!(cache.is_dirty(&alice, "p1"));
    }

    #[tokio::test]
    async fn users_fetch_their_own_documents() {
        let (cache, store, alice) = setup();
        let bob = Identity::new("bob");
        store.insert_raw("p", "p1-bob", json!({"n": "Mini", "g": ["Z"]}));

        assert_eq!(cache.get_possibly_stale(&store, Some(&alice), "p1").await.unwrap(), None);
        let bobs = cache.get_possibly_stale(&store, Some(&bob), "p1").await.unwrap();
        assert_eq!(bobs, Some(play("Mini", &["Z"])));
        assert_eq!(cache.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Absent);
    }
}
