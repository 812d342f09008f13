//! Decoding of untrusted play documents into typed records.
//!
//! Every failure is reported as a [`ValidationReport`]: the list of paths
//! that did not match the expected shape, in the spirit of a path reporter.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::dao::models::{
    CLIENT_TAG_FIELD, LegacyPlayRecord, PlayRecord, ScopedPlayMap, TITLE_FIELD, TimestampedPlayMap,
};

/// Single shape violation found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Slash separated location of the offending value (`$` is the root).
    pub path: String,
    /// What was wrong with it.
    pub message: String,
}

/// Structured list of violations produced by a failed decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Violations in discovery order.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Paths of all violations.
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }

    /// Whether no violation was recorded.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationReport> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    fn merge_validator(&mut self, prefix: &str, errors: &ValidationErrors) {
        for (field, kind) in errors.errors() {
            let path = format!("{prefix}/{}", wire_name(field));
            match kind {
                ValidationErrorsKind::Field(list) => {
                    for err in list {
                        let message = err
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| err.code.to_string());
                        self.push(path.clone(), message);
                    }
                }
                ValidationErrorsKind::Struct(nested) => self.merge_validator(&path, nested),
                ValidationErrorsKind::List(items) => {
                    for (index, nested) in items {
                        self.merge_validator(&format!("{path}/{index}"), nested);
                    }
                }
            }
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&rendered)
    }
}

/// Map struct field names reported by `validator` back to their wire names.
fn wire_name(field: &str) -> &str {
    match field {
        "title" => TITLE_FIELD,
        "client_tag" => CLIENT_TAG_FIELD,
        "payload" => "*",
        other => other,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check the typed core of a play object before handing it to serde.
fn check_play_fields(
    report: &mut ValidationReport,
    path: &str,
    object: &Map<String, Value>,
    legacy: bool,
) {
    match object.get(TITLE_FIELD) {
        Some(Value::String(_)) => {}
        Some(Value::Null) | None if legacy => {}
        Some(other) => report.push(
            format!("{path}/{TITLE_FIELD}"),
            format!("expected string, got {}", type_name(other)),
        ),
        None => report.push(format!("{path}/{TITLE_FIELD}"), "missing required field"),
    }
    match object.get(CLIENT_TAG_FIELD) {
        None | Some(Value::String(_)) | Some(Value::Null) => {}
        Some(other) => report.push(
            format!("{path}/{CLIENT_TAG_FIELD}"),
            format!("expected string, got {}", type_name(other)),
        ),
    }
    if legacy {
        match object.get("u") {
            None | Some(Value::String(_)) | Some(Value::Null) => {}
            Some(other) => report.push(
                format!("{path}/u"),
                format!("expected string, got {}", type_name(other)),
            ),
        }
    }
}

/// Deserialize an already shape-checked value, reporting anything serde still rejects.
fn deserialize_checked<T>(
    report: &mut ValidationReport,
    path: &str,
    value: Value,
) -> Option<T>
where
    T: DeserializeOwned,
{
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            report.push(path.to_string(), err.to_string());
            None
        }
    }
}

fn decode_current_play(report: &mut ValidationReport, path: &str, value: Value) -> Option<PlayRecord> {
    let Value::Object(object) = &value else {
        report.push(path.to_string(), format!("expected object or null, got {}", type_name(&value)));
        return None;
    };
    let before = report.violations.len();
    check_play_fields(report, path, object, false);
    if report.violations.len() != before {
        return None;
    }
    let record: PlayRecord = deserialize_checked(report, path, value)?;
    if let Err(errors) = record.validate() {
        report.merge_validator(path, &errors);
        return None;
    }
    Some(record)
}

/// Check a record about to be cached; anything accepted here decodes again
/// when the scope is next loaded from local storage.
pub fn check_play(record: &PlayRecord) -> Result<(), ValidationReport> {
    let mut report = ValidationReport::default();
    if let Err(errors) = record.validate() {
        report.merge_validator("$", &errors);
    }
    report.into_result(())
}

/// Decode the envelope persisted for one scope in the local store.
pub fn decode_timestamped_play_map(raw: &[u8]) -> Result<TimestampedPlayMap, ValidationReport> {
    let mut report = ValidationReport::default();
    let value: Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(err) => {
            report.push("$", format!("invalid JSON: {err}"));
            return Err(report);
        }
    };
    let mut envelope = match value {
        Value::Object(envelope) => envelope,
        other => {
            report.push("$", format!("expected object, got {}", type_name(&other)));
            return Err(report);
        }
    };

    let downloaded_at = match envelope.remove("downloadedAt") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => {
            match time::OffsetDateTime::parse(&raw, &time::format_description::well_known::Rfc3339) {
                Ok(ts) => Some(ts),
                Err(err) => {
                    report.push("$/downloadedAt", format!("invalid timestamp: {err}"));
                    None
                }
            }
        }
        Some(other) => {
            report.push(
                "$/downloadedAt",
                format!("expected timestamp or null, got {}", type_name(&other)),
            );
            None
        }
    };

    let mut data = ScopedPlayMap::new();
    match envelope.remove("data") {
        Some(Value::Object(entries)) => {
            for (puzzle_id, entry) in entries {
                let path = format!("$/data/{puzzle_id}");
                match entry {
                    Value::Null => {
                        data.insert(puzzle_id, None);
                    }
                    other => {
                        if let Some(record) = decode_current_play(&mut report, &path, other) {
                            data.insert(puzzle_id, Some(record));
                        }
                    }
                }
            }
        }
        Some(other) => report.push("$/data", format!("expected object, got {}", type_name(&other))),
        None => report.push("$/data", "missing required field"),
    }

    report.into_result(TimestampedPlayMap {
        downloaded_at,
        data,
    })
}

/// Decode a remote play document, accepting the legacy shape.
///
/// The title is left optional here; callers decide how to backfill it.
pub fn decode_legacy_play(value: Value) -> Result<LegacyPlayRecord, ValidationReport> {
    let mut report = ValidationReport::default();
    let Value::Object(object) = &value else {
        report.push("$", format!("expected object, got {}", type_name(&value)));
        return Err(report);
    };
    check_play_fields(&mut report, "$", object, true);
    if !report.is_empty() {
        return Err(report);
    }
    let Some(record) = deserialize_checked::<LegacyPlayRecord>(&mut report, "$", value) else {
        return Err(report);
    };
    report.into_result(record)
}
