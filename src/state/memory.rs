use dashmap::DashMap;

use crate::dao::models::TimestampedPlayMap;

/// Decoded play envelopes per scope, kept for the life of the session.
///
/// Unbounded: a session only ever sees a handful of scopes.
#[derive(Debug, Default)]
pub struct MemoryCache {
    scopes: DashMap<String, TimestampedPlayMap>,
}

impl MemoryCache {
    pub fn get(&self, scope: &str) -> Option<TimestampedPlayMap> {
        self.scopes.get(scope).map(|entry| entry.value().clone())
    }

    pub fn put(&self, scope: &str, plays: TimestampedPlayMap) {
        self.scopes.insert(scope.to_owned(), plays);
    }

    pub fn reset_all(&self) {
        self.scopes.clear();
    }
}
