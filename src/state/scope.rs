use std::fmt;

/// Scope holding the plays of signed-out visitors.
pub const ANONYMOUS_SCOPE: &str = "plays/logged-out";

const USER_SCOPE_PREFIX: &str = "plays/";

/// Authenticated user on whose behalf plays are read and written.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    uid: String,
}

impl Identity {
    /// Identity of the user with id `uid`.
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    /// User id, also stamped as the owner of remote plays.
    pub fn uid(&self) -> &str {
        &self.uid
    }
}

/// Storage scope of an identity: `plays/<uid>`, or the anonymous scope.
pub fn resolve_scope(identity: Option<&Identity>) -> String {
    match identity {
        Some(identity) => format!("{USER_SCOPE_PREFIX}{}", identity.uid),
        None => ANONYMOUS_SCOPE.to_owned(),
    }
}

/// Composite `<puzzle>-<uid>` key naming one user's play on one puzzle.
///
/// Used both for dirty tracking and as the remote document key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayKey(String);

impl PlayKey {
    /// Key of `identity`'s play on `puzzle_id`.
    pub fn new(puzzle_id: &str, identity: &Identity) -> Self {
        Self(format!("{puzzle_id}-{}", identity.uid))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PlayKey> for String {
    fn from(key: PlayKey) -> Self {
        key.0
    }
}
