use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dao::models::PlayRecord,
    state::{CachedPlay, Identity, WriteOutcome},
};

/// Optional signed-in user a request acts for.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// User id; omitted for signed-out visitors.
    pub user: Option<String>,
}

impl UserQuery {
    pub fn identity(&self) -> Option<Identity> {
        self.user
            .as_deref()
            .filter(|uid| !uid.is_empty())
            .map(Identity::new)
    }
}

/// What the local cache knows about a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Nothing cached; the remote store must be asked.
    Unknown,
    /// Known not to exist.
    Absent,
    /// Cached value returned in `play`.
    Present,
}

/// Play lookup result.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayLookupResponse {
    pub puzzle_id: String,
    pub status: CacheStatus,
    #[schema(value_type = Option<Object>)]
    pub play: Option<PlayRecord>,
}

impl PlayLookupResponse {
    pub fn from_cached(puzzle_id: String, cached: CachedPlay) -> Self {
        let (status, play) = match cached {
            CachedPlay::Unknown => (CacheStatus::Unknown, None),
            CachedPlay::Absent => (CacheStatus::Absent, None),
            CachedPlay::Present(play) => (CacheStatus::Present, Some(play)),
        };
        Self {
            puzzle_id,
            status,
            play,
        }
    }

    pub fn from_resolved(puzzle_id: String, play: Option<PlayRecord>) -> Self {
        let status = if play.is_some() {
            CacheStatus::Present
        } else {
            CacheStatus::Absent
        };
        Self {
            puzzle_id,
            status,
            play,
        }
    }
}

/// Body of a play write.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WritePlayRequest {
    /// User id; omitted for signed-out visitors.
    #[serde(default)]
    pub user: Option<String>,
    /// New play, or `null` to record a confirmed absence; the key itself is required.
    #[serde(deserialize_with = "required_nullable")]
    #[schema(value_type = Option<Object>, required = true)]
    pub play: Option<PlayRecord>,
    /// Set when the play mirrors the remote store and needs no flush.
    #[serde(default)]
    pub clean: bool,
}

/// Accept `null` but not a missing key, which serde would otherwise read as `None`.
fn required_nullable<'de, D>(deserializer: D) -> Result<Option<PlayRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<PlayRecord>::deserialize(deserializer)
}

/// Result of a play write.
#[derive(Debug, Serialize, ToSchema)]
pub struct WritePlayResponse {
    /// False when the write matched the cached play and was dropped.
    pub stored: bool,
    /// Whether local storage accepted the write.
    pub persisted: bool,
    /// Whether the play now awaits a flush.
    pub dirty: bool,
}

impl WritePlayResponse {
    pub fn from_outcome(outcome: WriteOutcome, dirty: bool) -> Self {
        match outcome {
            WriteOutcome::Coalesced => Self {
                stored: false,
                persisted: false,
                dirty,
            },
            WriteOutcome::Stored { persisted, .. } => Self {
                stored: true,
                persisted,
                dirty,
            },
        }
    }
}

/// Dirty flag of a play.
#[derive(Debug, Serialize, ToSchema)]
pub struct DirtyResponse {
    pub puzzle_id: String,
    pub dirty: bool,
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;

    #[test]
    fn empty_user_is_anonymous() {
        let query = UserQuery {
            user: Some(String::new()),
        };
        assert!(query.identity().is_none());
        assert_eq!(
            UserQuery {
                user: Some("alice".into())
            }
            .identity(),
            Some(Identity::new("alice"))
        );
    }

    #[test]
    fn lookup_serializes_status_and_play() {
        let play = PlayRecord::new("Mini", Map::new());
        let response = PlayLookupResponse::from_cached("p1".into(), CachedPlay::Present(play));
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"puzzle_id": "p1", "status": "present", "play": {"n": "Mini"}})
        );

        let unknown = PlayLookupResponse::from_cached("p1".into(), CachedPlay::Unknown);
        assert_eq!(
            serde_json::to_value(&unknown).unwrap(),
            json!({"puzzle_id": "p1", "status": "unknown", "play": null})
        );
    }

    #[test]
    fn write_request_accepts_null_play() {
        let request: WritePlayRequest =
            serde_json::from_value(json!({"user": "alice", "play": null})).unwrap();
        assert!(request.play.is_none());
        assert!(!request.clean);
    }

    #[test]
    fn write_request_requires_the_play_key() {
        let err = serde_json::from_value::<WritePlayRequest>(json!({"user": "alice"})).unwrap_err();
        assert!(err.to_string().contains("missing field `play`"));

        let request: WritePlayRequest =
            serde_json::from_value(json!({"play": {"n": "Mini", "g": []}, "clean": true})).unwrap();
        assert_eq!(request.play.map(|play| play.title), Some("Mini".to_string()));
        assert!(request.user.is_none());
    }
}
