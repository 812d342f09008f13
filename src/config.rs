//! Application-level configuration loading: local storage location and remote backend choice.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::local_store::{DisabledBackend, FileBackend, LocalStore};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PLAYS_SYNC_CONFIG_PATH";
const DEFAULT_LOCAL_DIR: &str = "data/plays";
const DEFAULT_DATABASE: &str = "plays";

/// Where scope envelopes are persisted on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStoreKind {
    /// One file per scope under [`AppConfig::local_dir`].
    File,
    /// Process memory; lost on restart.
    Memory,
    /// Storage refused; every read is absent and every write fails.
    Disabled,
}

/// Remote document store holding the authoritative plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteBackend {
    /// CouchDB over HTTP, configured through `COUCH_*` variables.
    Couch,
    /// MongoDB, configured through `MONGO_URI` / `MONGO_DB`.
    Mongo,
    /// In-process store, useful for local development.
    Memory,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    local_store: LocalStoreKind,
    local_dir: PathBuf,
    remote: RemoteBackend,
    database: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        Self::load_from(&resolve_config_path())
    }

    fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        local_store = ?app_config.local_store,
                        remote = ?app_config.remote,
                        "loaded config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Kind of local store to build.
    pub fn local_store_kind(&self) -> LocalStoreKind {
        self.local_store
    }

    /// Directory used by the file-backed local store.
    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Remote backend the supervisor connects to.
    pub fn remote(&self) -> RemoteBackend {
        self.remote
    }

    /// Database name used when the environment does not name one.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Build the local store described by this configuration.
    pub fn build_local_store(&self) -> LocalStore {
        match self.local_store {
            LocalStoreKind::File => LocalStore::new(Arc::new(FileBackend::new(self.local_dir.clone()))),
            LocalStoreKind::Memory => LocalStore::in_memory(),
            LocalStoreKind::Disabled => LocalStore::new(Arc::new(DisabledBackend)),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            local_store: LocalStoreKind::File,
            local_dir: PathBuf::from(DEFAULT_LOCAL_DIR),
            remote: RemoteBackend::Couch,
            database: DEFAULT_DATABASE.to_owned(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    local_store: Option<LocalStoreKind>,
    #[serde(default)]
    local_dir: Option<PathBuf>,
    #[serde(default)]
    remote: Option<RemoteBackend>,
    #[serde(default)]
    database: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            local_store: value.local_store.unwrap_or(defaults.local_store),
            local_dir: value.local_dir.unwrap_or(defaults.local_dir),
            remote: value.remote.unwrap_or(defaults.remote),
            database: value
                .database
                .filter(|name| !name.is_empty())
                .unwrap_or(defaults.database),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
