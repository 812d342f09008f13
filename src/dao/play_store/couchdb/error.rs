//! Failures of the CouchDB plays backend.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for the CouchDB plays backend.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Ways talking to the CouchDB plays database can fail.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// `COUCH_BASE_URL` (or another required variable) is not set.
    #[error("missing CouchDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// The server URL does not parse or cannot hold a database path.
    #[error("invalid CouchDB base URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// Probing the plays database failed at the transport level.
    #[error("failed to reach plays database `{database}`")]
    DatabaseQuery {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// Creating the missing plays database failed at the transport level.
    #[error("failed to create plays database `{database}`")]
    DatabaseCreate {
        database: String,
        #[source]
        source: reqwest::Error,
    },
    /// The plays database answered a probe or creation with an unexpected status.
    #[error("plays database `{database}` answered with status {status}")]
    DatabaseStatus {
        database: String,
        status: StatusCode,
    },
    /// A play document request could not be sent.
    #[error("failed to send request for play document `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A play document request got an unexpected status (conflicts included).
    #[error("play document `{path}` answered with status {status}")]
    RequestStatus { path: String, status: StatusCode },
    /// A play document body was not JSON.
    #[error("failed to decode play document `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
}
