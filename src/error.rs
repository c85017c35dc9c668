//! Error types for the engine's fallible boundaries.
//!
//! Not-ready data is never an error here; it is modelled as absence.

use thiserror::Error;

/// A layer token that does not match `{t|v|r|p}{digits}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayerIdError {
    #[error("empty layer identifier")]
    Empty,
    #[error("unknown layer type prefix in {token:?}")]
    UnknownPrefix { token: String },
    #[error("invalid numeric id in layer identifier {token:?}")]
    InvalidId { token: String },
}

/// Failure talking to the dataset REST API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot reach API at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },
    #[error("device is offline")]
    Offline,
    #[error("API returned {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("invalid pagination link {link:?}")]
    BadLink { link: String },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
