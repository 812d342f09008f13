#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::dao::{models::OwnedPlayRecord, storage::StorageResult};

/// Collection tag under which plays are stored remotely.
pub const PLAYS_COLLECTION: &str = "p";

/// Key-addressed remote document store holding the authoritative plays.
///
/// Reads hand back raw JSON: documents are untrusted and must go through the
/// validation layer. Writes are trusted and take the typed record.
pub trait PlayStore: Send + Sync {
    fn get(
        &self,
        collection: &'static str,
        key: String,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>>;
    fn set(
        &self,
        collection: &'static str,
        key: String,
        document: OwnedPlayRecord,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
