use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::dao::{
    models::OwnedPlayRecord,
    play_store::PlayStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchPlayDocument, CouchRevision, document_id, strip_metadata},
};

/// [`PlayStore`] backed by a CouchDB database over its HTTP API.
#[derive(Clone)]
pub struct CouchPlayStore {
    client: Client,
    database_url: Url,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchPlayStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let database_url = database_url(&config.base_url, &config.database)?;
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            database_url,
            database,
            auth,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, doc_id: &str) -> reqwest::RequestBuilder {
        let url = document_url(&self.database_url, doc_id);
        self.authorized(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url.clone();

        let response = self
            .authorized(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorized(self.client.put(url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }
}

/// URL of `database` under the server at `base_url`.
fn database_url(base_url: &str, database: &str) -> CouchResult<Url> {
    let mut url = Url::parse(base_url).map_err(|err| CouchDaoError::InvalidBaseUrl {
        url: base_url.to_owned(),
        reason: err.to_string(),
    })?;
    url.path_segments_mut()
        .map_err(|()| CouchDaoError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: "URL cannot carry a path".to_owned(),
        })?
        .pop_if_empty()
        .push(database);
    Ok(url)
}

/// URL of one document; the id is a single percent-encoded path segment
/// whatever characters the puzzle id carries.
fn document_url(database_url: &Url, doc_id: &str) -> Url {
    let mut url = database_url.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.push(doc_id);
    }
    url
}

impl PlayStore for CouchPlayStore {
    fn get(
        &self,
        collection: &'static str,
        key: String,
    ) -> BoxFuture<'static, StorageResult<Option<Value>>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = document_id(collection, &key);
            debug!(%doc_id, "fetching play document from CouchDB");
            match store.get_document::<Value>(&doc_id).await? {
                None => Ok(None),
                Some(Value::Object(document)) => Ok(Some(strip_metadata(document))),
                Some(_) => Err(StorageError::NotADocument { key }),
            }
        })
    }

    fn set(
        &self,
        collection: &'static str,
        key: String,
        document: OwnedPlayRecord,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let doc_id = document_id(collection, &key);
            let rev = store
                .get_document::<CouchRevision>(&doc_id)
                .await?
                .map(|existing| existing.rev);
            let doc = CouchPlayDocument {
                id: doc_id.clone(),
                rev,
                play: document,
            };
            store.put_document(&doc_id, &doc).await.map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url.to_string();
            let response = store
                .authorized(store.client.get(store.database_url.clone()))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
