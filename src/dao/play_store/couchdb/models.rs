use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::models::OwnedPlayRecord;

/// Separator between the collection tag and the document key.
pub const COLLECTION_SEPARATOR: &str = "::";

/// Build the CouchDB `_id` of a document, e.g. `p::puzzle-uid`.
pub fn document_id(collection: &str, key: &str) -> String {
    format!("{collection}{COLLECTION_SEPARATOR}{key}")
}

/// Metadata CouchDB adds to every stored document.
#[derive(Debug, Deserialize)]
pub struct CouchRevision {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// A play as written to CouchDB.
#[derive(Debug, Serialize)]
pub struct CouchPlayDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub play: OwnedPlayRecord,
}

/// Drop CouchDB bookkeeping fields so only the play body reaches validation.
pub fn strip_metadata(mut document: Map<String, Value>) -> Value {
    document.retain(|field, _| !field.starts_with('_'));
    Value::Object(document)
}
