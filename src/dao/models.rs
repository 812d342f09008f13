use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

/// Title stored on legacy plays that were saved without one.
pub const TITLE_PLACEHOLDER: &str = "Title unknown";

/// Wire name of the owner field stamped on remote documents.
pub const OWNER_FIELD: &str = "u";
/// Wire name of the title field.
pub const TITLE_FIELD: &str = "n";
/// Wire name of the transient client tag field.
pub const CLIENT_TAG_FIELD: &str = "ua";

/// One user's progress on one puzzle, as kept in the local cache.
///
/// Only the fields the cache reasons about are typed; the solve state itself
/// travels untouched in [`PlayRecord::payload`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct PlayRecord {
    /// Display title of the puzzle.
    #[serde(rename = "n")]
    pub title: String,
    /// Client that produced the record (usually a user agent).
    #[serde(rename = "ua", default, skip_serializing_if = "Option::is_none")]
    pub client_tag: Option<String>,
    /// Opaque solve state (grid, timings, flags...).
    #[serde(flatten)]
    #[validate(custom(function = "validate_payload"))]
    pub payload: Map<String, Value>,
}

impl PlayRecord {
    /// Build a record from its title and opaque payload.
    pub fn new(title: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            title: title.into(),
            client_tag: None,
            payload,
        }
    }

    /// Attach the client tag.
    pub fn with_client_tag(mut self, tag: impl Into<String>) -> Self {
        self.client_tag = Some(tag.into());
        self
    }

    /// Compare two records ignoring the transient client tag.
    pub fn same_content(&self, other: &PlayRecord) -> bool {
        self.title == other.title && self.payload == other.payload
    }

    /// Stamp the owner id for the remote write.
    pub fn into_owned(self, owner_id: impl Into<String>) -> OwnedPlayRecord {
        OwnedPlayRecord {
            owner_id: owner_id.into(),
            play: self,
        }
    }
}

/// The local representation never carries the owner id nor a second copy of
/// the typed fields.
fn validate_payload(payload: &Map<String, Value>) -> Result<(), ValidationError> {
    for reserved in [OWNER_FIELD, TITLE_FIELD, CLIENT_TAG_FIELD] {
        if payload.contains_key(reserved) {
            let mut err = ValidationError::new("reserved_field");
            err.message = Some(format!("field `{reserved}` is not allowed here").into());
            return Err(err);
        }
    }
    Ok(())
}

/// A play as written to the remote store, stamped with its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnedPlayRecord {
    /// Id of the user owning the play.
    #[serde(rename = "u")]
    pub owner_id: String,
    /// The play itself.
    #[serde(flatten)]
    pub play: PlayRecord,
}

/// A play as found in the remote store, in either the current or legacy shape.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyPlayRecord {
    /// Title, missing or empty on older documents.
    #[serde(rename = "n", default)]
    pub title: Option<String>,
    /// Owner stamped by the writer; dropped when normalizing.
    #[serde(rename = "u", default)]
    pub owner_id: Option<String>,
    /// Client tag.
    #[serde(rename = "ua", default)]
    pub client_tag: Option<String>,
    /// Opaque solve state.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl LegacyPlayRecord {
    /// Normalize to the current shape, backfilling a missing title.
    pub fn into_current(self) -> PlayRecord {
        let title = self
            .title
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| TITLE_PLACEHOLDER.to_string());
        PlayRecord {
            title,
            client_tag: self.client_tag,
            payload: self.payload,
        }
    }
}

/// Plays of one storage scope keyed by puzzle id; `None` marks a play known
/// to be absent remotely.
pub type ScopedPlayMap = IndexMap<String, Option<PlayRecord>>;

/// Envelope persisted in the local store for each scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimestampedPlayMap {
    /// Set only when the map was just pulled from the remote store.
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub downloaded_at: Option<OffsetDateTime>,
    /// The plays themselves.
    pub data: ScopedPlayMap,
}

impl TimestampedPlayMap {
    /// Wrap a map produced by local writes.
    pub fn local(data: ScopedPlayMap) -> Self {
        Self {
            downloaded_at: None,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn client_tag_is_ignored_by_content_equality() {
        let a = PlayRecord::new("Mini", payload(json!({"g": ["A", "B"]}))).with_client_tag("x");
        let b = PlayRecord::new("Mini", payload(json!({"g": ["A", "B"]}))).with_client_tag("y");
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn payload_differences_are_detected() {
        let a = PlayRecord::new("Mini", payload(json!({"g": ["A", "B"]})));
        let b = PlayRecord::new("Mini", payload(json!({"g": ["A", "C"]})));
        assert!(!a.same_content(&b));
    }

    #[test]
    fn record_serializes_with_flattened_payload() {
        let record = PlayRecord::new("Mini", payload(json!({"t": 12, "f": true}))).with_client_tag("ua");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"n": "Mini", "ua": "ua", "t": 12, "f": true}));
    }

    #[test]
    fn owned_record_carries_owner_field() {
        let owned = PlayRecord::new("Mini", Map::new()).into_owned("alice");
        let value = serde_json::to_value(&owned).unwrap();
        assert_eq!(value, json!({"u": "alice", "n": "Mini"}));
    }

    #[test]
    fn legacy_record_without_title_is_backfilled() {
        let legacy: LegacyPlayRecord =
            serde_json::from_value(json!({"u": "alice", "g": []})).unwrap();
        let current = legacy.into_current();
        assert_eq!(current.title, TITLE_PLACEHOLDER);
        assert_eq!(current.payload, payload(json!({"g": []})));
    }

    #[test]
    fn legacy_record_with_empty_title_is_backfilled() {
        let legacy: LegacyPlayRecord = serde_json::from_value(json!({"n": ""})).unwrap();
        assert_eq!(legacy.into_current().title, TITLE_PLACEHOLDER);
    }

    #[test]
    fn payload_rejects_owner_field() {
        let record = PlayRecord::new("Mini", payload(json!({"u": "alice"})));
        assert!(record.validate().is_err());
    }

    #[test]
    fn envelope_uses_camel_case_and_null_timestamp() {
        let envelope = TimestampedPlayMap::local(ScopedPlayMap::from([("p1".to_string(), None)]));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"downloadedAt": null, "data": {"p1": null}}));
    }
}
