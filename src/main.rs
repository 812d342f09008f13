//! plays-sync binary entrypoint wiring the play cache, the remote store supervisor and REST routes.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plays_sync::{
    config::{AppConfig, RemoteBackend},
    dao::{
        play_store::{PlayStore, memory::MemoryPlayStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config.build_local_store());

    spawn_supervisor(&app_state, &config);
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the background task keeping the configured remote store connected.
fn spawn_supervisor(state: &SharedState, config: &AppConfig) {
    let database = config.database().to_owned();
    match config.remote() {
        RemoteBackend::Memory => {
            let store = MemoryPlayStore::new();
            tokio::spawn(storage_supervisor::run(state.clone(), move || {
                let store = store.clone();
                async move { Ok::<_, StorageError>(Arc::new(store) as Arc<dyn PlayStore>) }
            }));
        }
        RemoteBackend::Couch => spawn_couch(state, database),
        RemoteBackend::Mongo => spawn_mongo(state, database),
    }
}

#[cfg(feature = "couch-store")]
fn spawn_couch(state: &SharedState, database: String) {
    use plays_sync::dao::play_store::couchdb::{CouchConfig, CouchPlayStore};

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let database = database.clone();
        async move {
            let config = CouchConfig::from_env(&database)?;
            let store = CouchPlayStore::connect(config).await?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn PlayStore>)
        }
    }));
}

#[cfg(not(feature = "couch-store"))]
fn spawn_couch(_state: &SharedState, _database: String) {
    warn!("CouchDB support not compiled in; staying in degraded mode");
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo(state: &SharedState, database: String) {
    use plays_sync::dao::play_store::mongodb::{MongoConfig, MongoPlayStore};

    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let database = database.clone();
        async move {
            let config = MongoConfig::from_env(&database).await?;
            let store = MongoPlayStore::connect(config).await?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn PlayStore>)
        }
    }));
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo(_state: &SharedState, _database: String) {
    warn!("MongoDB support not compiled in; staying in degraded mode");
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
