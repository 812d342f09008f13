use std::error::Error;
use thiserror::Error;

/// Result alias for remote play store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by remote play stores regardless of the backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the request.
    #[error("remote store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend answered with a payload that is not a JSON document.
    #[error("remote document `{key}` is not a JSON object")]
    NotADocument { key: String },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
