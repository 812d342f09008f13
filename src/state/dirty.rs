use dashmap::DashSet;

use super::scope::PlayKey;

/// Plays changed locally and not yet confirmed by the remote store.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    keys: DashSet<PlayKey>,
}

impl DirtyTracker {
    pub fn mark(&self, key: PlayKey) {
        self.keys.insert(key);
    }

    /// Returns whether the key was dirty.
    pub fn unmark(&self, key: &PlayKey) -> bool {
        self.keys.remove(key).is_some()
    }

    pub fn is_dirty(&self, key: &PlayKey) -> bool {
        self.keys.contains(key)
    }

    pub fn clear(&self) {
        self.keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::scope::Identity;

    #[test]
    fn marks_are_per_key() {
        let tracker = DirtyTracker::default();
        let alice = PlayKey::new("p1", &Identity::new("alice"));
        let bob = PlayKey::new("p1", &Identity::new("bob"));

        tracker.mark(alice.clone());
        assert!(tracker.is_dirty(&alice));
        assert!(!tracker.is_dirty(&bob));

        assert!(tracker.unmark(&alice));
        assert!(!tracker.unmark(&alice));
        assert!(!tracker.is_dirty(&alice));
    }
}
