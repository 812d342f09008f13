//! Persistent local store holding one serialized play envelope per scope.
//!
//! The environment may refuse storage entirely (sandboxed or embedded
//! hosts), so [`LocalStore`] is the single place where those failures are
//! absorbed: reads degrade to "absent" and writes to `false`.

mod disabled;
mod file;
mod memory;

use std::{io, sync::Arc};

use tracing::{debug, warn};

pub use disabled::DisabledBackend;
pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Raw key-value byte store the adapter wraps; free to fail.
pub trait KeyValueBackend: Send + Sync {
    /// Bytes stored under `key`, `None` when nothing was ever written.
    fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>>;
    /// Replace the bytes stored under `key`.
    fn set(&self, key: &str, value: &[u8]) -> io::Result<()>;
}

/// Failure-isolating adapter over a [`KeyValueBackend`].
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl LocalStore {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    /// Store kept in process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// Read the envelope stored for `scope`; backend faults read as absent.
    pub fn read(&self, scope: &str) -> Option<Vec<u8>> {
        match self.backend.get(scope) {
            Ok(value) => value,
            Err(err) => {
                warn!(scope, error = %err, "not loading plays from local storage");
                None
            }
        }
    }

    /// Persist the envelope for `scope`, returning whether it was stored.
    pub fn write(&self, scope: &str, value: &[u8]) -> bool {
        match self.backend.set(scope, value) {
            Ok(()) => {
                debug!(scope, bytes = value.len(), "persisted plays to local storage");
                true
            }
            Err(err) => {
                warn!(scope, error = %err, "not caching plays, local storage write failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips_bytes() {
        let store = LocalStore::in_memory();
        assert_eq!(store.read("plays/alice"), None);
        assert!(store.write("plays/alice", b"{}"));
        assert_eq!(store.read("plays/alice").as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn disabled_backend_is_absorbed() {
        let store = LocalStore::new(Arc::new(DisabledBackend));
        assert!(!store.write("plays/alice", b"{}"));
        assert_eq!(store.read("plays/alice"), None);
    }
}
