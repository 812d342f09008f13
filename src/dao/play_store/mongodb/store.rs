use std::sync::Arc;

use futures::future::BoxFuture;
use mongodb::{Client, Database, bson::Document, bson::doc};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoPlayDocument, doc_id, strip_id},
};
use crate::dao::{models::OwnedPlayRecord, play_store::PlayStore, storage::StorageResult};

/// [`PlayStore`] backed by MongoDB, one collection per collection tag.
#[derive(Clone)]
pub struct MongoPlayStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoPlayStore {
    /// Establish a connection to MongoDB.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        Ok(Self { inner })
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn load_play(&self, collection: &'static str, key: String) -> MongoResult<Option<Value>> {
        let documents = self.database().await.collection::<Document>(collection);
        let found = documents
            .find_one(doc_id(&key))
            .await
            .map_err(|source| MongoDaoError::LoadPlay {
                collection,
                key: key.clone(),
                source,
            })?;

        found
            .map(|document| {
                serde_json::to_value(&document)
                    .map(strip_id)
                    .map_err(|source| MongoDaoError::Convert { key, source })
            })
            .transpose()
    }

    async fn save_play(
        &self,
        collection: &'static str,
        key: String,
        play: OwnedPlayRecord,
    ) -> MongoResult<()> {
        let plays = self.database().await.collection::<MongoPlayDocument>(collection);
        let document = MongoPlayDocument {
            id: key.clone(),
            play,
        };
        plays
            .replace_one(doc_id(&key), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SavePlay {
                collection,
                key,
                source,
            })?;
        Ok(())
    }
}

impl PlayStore for MongoPlayStore {
    fn get(
        &self,
        collection: &'static str,
        key: String,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        Box::pin(async move { store.load_play(collection, key).await.map_err(Into::into) })
    }

    fn set(
        &self,
        collection: &'static str,
        key: String,
        document: OwnedPlayRecord,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_play(collection, key, document)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
