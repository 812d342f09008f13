use mongodb::bson::{Document, doc};
use serde::Serialize;
use serde_json::Value;

use crate::dao::models::OwnedPlayRecord;

/// A play as written to MongoDB, keyed by the composite play key.
#[derive(Debug, Serialize)]
pub struct MongoPlayDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub play: OwnedPlayRecord,
}

pub fn doc_id(key: &str) -> Document {
    doc! {"_id": key}
}

/// Remove the MongoDB primary key so only the play body reaches validation.
pub fn strip_id(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.remove("_id");
            Value::Object(object)
        }
        other => other,
    }
}
