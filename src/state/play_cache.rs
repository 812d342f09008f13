use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    dao::{
        local_store::LocalStore,
        models::{PlayRecord, ScopedPlayMap, TimestampedPlayMap},
    },
    dto::validation::{ValidationReport, check_play, decode_timestamped_play_map},
};

use super::{
    dirty::DirtyTracker,
    memory::MemoryCache,
    scope::{Identity, PlayKey, resolve_scope},
};

/// Failures of the local cache itself.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The envelope found in local storage does not decode.
    #[error("couldn't parse plays stored locally for `{scope}`: {report}")]
    CorruptLocalState {
        scope: String,
        report: ValidationReport,
    },
    /// The play offered to `write` would not decode once persisted.
    #[error("refusing to cache play for `{puzzle_id}`: {report}")]
    InvalidPlay {
        puzzle_id: String,
        report: ValidationReport,
    },
}

/// What the local cache knows about one play.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPlay {
    /// Nothing cached; only the remote store can tell.
    Unknown,
    /// Known not to exist remotely.
    Absent,
    /// Cached value.
    Present(PlayRecord),
}

impl CachedPlay {
    fn from_entry(entry: Option<&Option<PlayRecord>>) -> Self {
        match entry {
            None => CachedPlay::Unknown,
            Some(None) => CachedPlay::Absent,
            Some(Some(play)) => CachedPlay::Present(play.clone()),
        }
    }

    /// The cached play, if one is present.
    pub fn into_play(self) -> Option<PlayRecord> {
        match self {
            CachedPlay::Present(play) => Some(play),
            CachedPlay::Unknown | CachedPlay::Absent => None,
        }
    }
}

/// Result of [`PlayCache::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value matched the cached one; nothing was touched.
    Coalesced,
    /// The value replaced the cached one.
    Stored {
        /// Whether local storage accepted the envelope.
        persisted: bool,
        /// Whether the play now needs a flush.
        marked_dirty: bool,
    },
}

/// Local-first cache of in-progress plays for one hosting session.
///
/// Reads go memory, then local storage; writes always land locally and are
/// sent to the remote store only by an explicit flush. Every
/// check-then-update sequence runs under a session gate that is never held
/// across an `.await`.
pub struct PlayCache {
    local: LocalStore,
    memory: MemoryCache,
    dirty: DirtyTracker,
    gate: Mutex<()>,
}

impl PlayCache {
    /// Create an empty session cache over `local`.
    pub fn new(local: LocalStore) -> Self {
        Self {
            local,
            memory: MemoryCache::default(),
            dirty: DirtyTracker::default(),
            gate: Mutex::new(()),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Storage scope for `identity`.
    pub fn resolve_scope(identity: Option<&Identity>) -> String {
        resolve_scope(identity)
    }

    /// Plays stored under `scope`, empty when nothing was ever stored.
    pub fn load_scope(&self, scope: &str) -> Result<ScopedPlayMap, CacheError> {
        let _gate = self.lock();
        self.load_scope_locked(scope)
    }

    pub(crate) fn load_scope_locked(&self, scope: &str) -> Result<ScopedPlayMap, CacheError> {
        if let Some(cached) = self.memory.get(scope) {
            return Ok(cached.data);
        }

        let Some(raw) = self.local.read(scope) else {
            return Ok(ScopedPlayMap::new());
        };

        match decode_timestamped_play_map(&raw) {
            Ok(envelope) => {
                info!(scope, plays = envelope.data.len(), "loaded plays from local storage");
                let data = envelope.data.clone();
                self.memory.put(scope, envelope);
                Ok(data)
            }
            Err(report) => {
                error!(scope, %report, "couldn't parse plays in local storage");
                Err(CacheError::CorruptLocalState {
                    scope: scope.to_owned(),
                    report,
                })
            }
        }
    }

    /// Cached play of `identity` on `puzzle_id`, never contacting the remote store.
    pub fn get_cached(
        &self,
        identity: Option<&Identity>,
        puzzle_id: &str,
    ) -> Result<CachedPlay, CacheError> {
        let scope = resolve_scope(identity);
        let plays = self.load_scope(&scope)?;
        Ok(CachedPlay::from_entry(plays.get(puzzle_id)))
    }

    /// Store `play` (or a confirmed absence) for `identity` on `puzzle_id`.
    ///
    /// Writes whose content matches the cached value, client tag aside, are
    /// dropped. Otherwise the scope is persisted (a storage failure only
    /// logs) and, for a signed-in user writing a play that did not come from
    /// the remote store, the play is marked dirty.
    pub fn write(
        &self,
        identity: Option<&Identity>,
        puzzle_id: &str,
        play: Option<PlayRecord>,
        is_clean: bool,
    ) -> Result<WriteOutcome, CacheError> {
        if let Some(play) = &play {
            check_play(play).map_err(|report| CacheError::InvalidPlay {
                puzzle_id: puzzle_id.to_owned(),
                report,
            })?;
        }
        let scope = resolve_scope(identity);
        let _gate = self.lock();
        let mut plays = self.load_scope_locked(&scope)?;

        if let Some(stored) = plays.get(puzzle_id) {
            let unchanged = match (stored, &play) {
                (Some(stored), Some(incoming)) => stored.same_content(incoming),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                debug!(%scope, puzzle_id, "play unchanged; skipping write");
                return Ok(WriteOutcome::Coalesced);
            }
        }

        let has_play = play.is_some();
        plays.insert(puzzle_id.to_owned(), play);
        let envelope = TimestampedPlayMap::local(plays);

        let persisted = match serde_json::to_vec(&envelope) {
            Ok(raw) => self.local.write(&scope, &raw),
            Err(err) => {
                warn!(%scope, error = %err, "failed to serialize plays; keeping them in memory only");
                false
            }
        };
        self.memory.put(&scope, envelope);

        let marked_dirty = match identity {
            Some(identity) if has_play && !is_clean => {
                self.dirty.mark(PlayKey::new(puzzle_id, identity));
                true
            }
            _ => false,
        };

        Ok(WriteOutcome::Stored {
            persisted,
            marked_dirty,
        })
    }

    /// Whether `identity`'s play on `puzzle_id` has unflushed local changes.
    pub fn is_dirty(&self, identity: &Identity, puzzle_id: &str) -> bool {
        self.dirty.is_dirty(&PlayKey::new(puzzle_id, identity))
    }

    /// Forget everything held in memory for this session.
    ///
    /// Local storage is left untouched.
    pub fn reset(&self) {
        let _gate = self.lock();
        self.memory.reset_all();
        self.dirty.clear();
    }

    #[cfg(test)]
    pub(crate) fn local_store(&self) -> &LocalStore {
        &self.local
    }

    pub(crate) fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::Arc};

    use serde_json::{Map, json};

    use super::*;
    use crate::dao::local_store::{DisabledBackend, KeyValueBackend, MemoryBackend};

    /// Memory backend counting successful writes.
    #[derive(Default)]
    struct CountingBackend {
        inner: MemoryBackend,
        writes: std::sync::atomic::AtomicUsize,
    }

    impl KeyValueBackend for CountingBackend {
        fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> io::Result<()> {
            self.writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.set(key, value)
        }
    }

    impl CountingBackend {
        fn writes(&self) -> usize {
            self.writes.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    fn play(title: &str, grid: &[&str]) -> PlayRecord {
        let mut payload = Map::new();
        payload.insert("g".into(), json!(grid));
        PlayRecord::new(title, payload)
    }

    fn counting_cache() -> (PlayCache, Arc<CountingBackend>) {
        let backend = Arc::new(CountingBackend::default());
        let cache = PlayCache::new(LocalStore::new(backend.clone()));
        (cache, backend)
    }

    #[test]
    fn unknown_scope_loads_empty() {
        let cache = PlayCache::new(LocalStore::in_memory());
        assert!(cache.load_scope("plays/alice").unwrap().is_empty());
        assert_eq!(
            cache.get_cached(None, "p1").unwrap(),
            CachedPlay::Unknown
        );
    }

    #[test]
    fn written_play_reads_back_unchanged() {
        let cache = PlayCache::new(LocalStore::in_memory());
        let alice = Identity::new("alice");
        let record = play("Mini", &["A", "B"]).with_client_tag("firefox");

        cache
            .write(Some(&alice), "p1", Some(record.clone()), false)
            .unwrap();

        assert_eq!(
            cache.get_cached(Some(&alice), "p1").unwrap(),
            CachedPlay::Present(record)
        );
    }

    #[test]
    fn repeated_write_is_coalesced() {
        let (cache, backend) = counting_cache();
        let alice = Identity::new("alice");

        let first = cache
            .write(Some(&alice), "p1", Some(play("Mini", &["A"]).with_client_tag("v1")), false)
            .unwrap();
        assert_eq!(
            first,
            WriteOutcome::Stored {
                persisted: true,
                marked_dirty: true
            }
        );

        cache.dirty().unmark(&PlayKey::new("p1", &alice));
        let second = cache
            .write(Some(&alice), "p1", Some(play("Mini", &["A"]).with_client_tag("v2")), false)
            .unwrap();

        assert_eq!(second, WriteOutcome::Coalesced);
        assert_eq!(backend.writes(), 1);
        assert!(!cache.is_dirty(&alice, "p1"));
        // The first client tag is kept since the second write was dropped.
        let cached = cache.get_cached(Some(&alice), "p1").unwrap().into_play().unwrap();
        assert_eq!(cached.client_tag.as_deref(), Some("v1"));
    }

    #[test]
    fn changed_content_is_written_and_dirtied() {
        let (cache, backend) = counting_cache();
        let alice = Identity::new("alice");

        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), true).unwrap();
        assert!(!cache.is_dirty(&alice, "p1"));

        cache.write(Some(&alice), "p1", Some(play("Mini", &["B"])), false).unwrap();
        assert!(cache.is_dirty(&alice, "p1"));
        assert_eq!(backend.writes(), 2);
    }

    #[test]
    fn confirmed_absence_is_cached_but_never_dirty() {
        let cache = PlayCache::new(LocalStore::in_memory());
        let alice = Identity::new("alice");

        let outcome = cache.write(Some(&alice), "p1", None, false).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Stored {
                persisted: true,
                marked_dirty: false
            }
        );
        assert_eq!(cache.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Absent);
        assert_eq!(
            cache.write(Some(&alice), "p1", None, false).unwrap(),
            WriteOutcome::Coalesced
        );
    }

    #[test]
    fn anonymous_writes_are_never_dirty() {
        let cache = PlayCache::new(LocalStore::in_memory());
        let outcome = cache.write(None, "p1", Some(play("Mini", &[])), false).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Stored {
                persisted: true,
                marked_dirty: false
            }
        );
        assert!(
            cache
                .load_scope(crate::state::scope::ANONYMOUS_SCOPE)
                .unwrap()
                .contains_key("p1")
        );
    }

    #[test]
    fn scopes_do_not_share_plays() {
        let cache = PlayCache::new(LocalStore::in_memory());
        let alice = Identity::new("alice");
        let bob = Identity::new("bob");

        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();
        cache.write(Some(&bob), "p1", Some(play("Mini", &["Z"])), false).unwrap();

        let a = cache.load_scope("plays/alice").unwrap();
        let b = cache.load_scope("plays/bob").unwrap();
        assert_eq!(a["p1"], Some(play("Mini", &["A"])));
        assert_eq!(b["p1"], Some(play("Mini", &["Z"])));
        assert_eq!(cache.get_cached(None, "p1").unwrap(), CachedPlay::Unknown);
    }

    #[test]
    fn load_scope_is_stable_between_writes() {
        let cache = PlayCache::new(LocalStore::in_memory());
        let alice = Identity::new("alice");
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();

        let first = cache.load_scope("plays/alice").unwrap();
        let second = cache.load_scope("plays/alice").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn plays_survive_a_new_session_through_local_storage() {
        let local = LocalStore::in_memory();
        let alice = Identity::new("alice");
        PlayCache::new(local.clone())
            .write(Some(&alice), "p1", Some(play("Mini", &["A"])), false)
            .unwrap();

        let next_session = PlayCache::new(local);
        assert_eq!(
            next_session.get_cached(Some(&alice), "p1").unwrap(),
            CachedPlay::Present(play("Mini", &["A"]))
        );
        assert!(!next_session.is_dirty(&alice, "p1"));
    }

    #[test]
    fn corrupt_local_state_is_fatal() {
        let local = LocalStore::in_memory();
        local.write("plays/alice", br#"{"downloadedAt": null, "data": {"p1": {"g": []}}}"#);
        let cache = PlayCache::new(local);

        let err = cache.get_cached(Some(&Identity::new("alice")), "p1").unwrap_err();
        match err {
            CacheError::CorruptLocalState { scope, report } => {
                assert_eq!(scope, "plays/alice");
                assert_eq!(report.paths(), vec!["$/data/p1/n"]);
            }
            other => panic!("expected corrupt local state, got {other:?}"),
        }
    }

    #[test]
    fn every_accepted_write_loads_in_a_new_session() {
        let local = LocalStore::in_memory();
        let alice = Identity::new("alice");
        let untitled = play("", &["A"]);
        let long_tag = play("Mini", &["B"]).with_client_tag("x".repeat(1500));
        {
            let cache = PlayCache::new(local.clone());
            cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();
            cache.write(Some(&alice), "p2", Some(untitled.clone()), false).unwrap();
            cache.write(Some(&alice), "p3", Some(long_tag.clone()), false).unwrap();
            cache.write(Some(&alice), "p4", None, true).unwrap();
        }

        let next_session = PlayCache::new(local);
        assert_eq!(
            next_session.get_cached(Some(&alice), "p1").unwrap(),
            CachedPlay::Present(play("Mini", &["A"]))
        );
        assert_eq!(
            next_session.get_cached(Some(&alice), "p2").unwrap(),
            CachedPlay::Present(untitled)
        );
        assert_eq!(
            next_session.get_cached(Some(&alice), "p3").unwrap(),
            CachedPlay::Present(long_tag)
        );
        assert_eq!(next_session.get_cached(Some(&alice), "p4").unwrap(), CachedPlay::Absent);
    }

    #[test]
    fn reserved_payload_keys_are_refused_before_storing() {
        let (cache, backend) = counting_cache();
        let alice = Identity::new("alice");
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), true).unwrap();

        for reserved in ["u", "n", "ua"] {
            let mut bad = play("Mini", &["B"]);
            bad.payload.insert(reserved.into(), json!("x"));
            let err = cache.write(Some(&alice), "p2", Some(bad), false).unwrap_err();
            assert!(matches!(err, CacheError::InvalidPlay { ref puzzle_id, .. } if puzzle_id == "p2"));
        }

        assert_eq!(backend.writes(), 1);
        assert!(!cache.is_dirty(&alice, "p2"));
        assert_eq!(cache.get_cached(Some(&alice), "p2").unwrap(), CachedPlay::Unknown);
        let reloaded = PlayCache::new(cache.local_store().clone());
        assert!(reloaded.get_cached(Some(&alice), "p1").is_ok());
    }

    #[test]
    fn disabled_storage_still_caches_in_memory() {
        let cache = PlayCache::new(LocalStore::new(Arc::new(DisabledBackend)));
        let alice = Identity::new("alice");

        let outcome = cache
            .write(Some(&alice), "p1", Some(play("Mini", &["A"])), false)
            .unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Stored {
                persisted: false,
                marked_dirty: true
            }
        );
        assert_eq!(
            cache.get_cached(Some(&alice), "p1").unwrap(),
            CachedPlay::Present(play("Mini", &["A"]))
        );
    }

    #[test]
    fn reset_forgets_memory_and_dirtiness() {
        let cache = PlayCache::new(LocalStore::new(Arc::new(DisabledBackend)));
        let alice = Identity::new("alice");
        cache.write(Some(&alice), "p1", Some(play("Mini", &["A"])), false).unwrap();

        cache.reset();

        assert!(!cache.is_dirty(&alice, "p1"));
        assert_eq!(cache.get_cached(Some(&alice), "p1").unwrap(), CachedPlay::Unknown);
    }
}
