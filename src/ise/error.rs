use thiserror::Error;

use crate::mac::MalformedMac;

#[derive(Debug, Error)]
pub enum IseError {
    /// Connect failure, timeout or TLS error before any HTTP status was seen
    #[error("identity backend unavailable: {0}")]
    BackendUnavailable(#[from] reqwest::Error),

    /// Non-success HTTP status, with the body exactly as returned
    #[error("identity backend rejected the request with HTTP {status}: {body}")]
    BackendRejected { status: u16, body: String },

    #[error("unexpected response from identity backend: {0}")]
    UnexpectedResponse(String),

    #[error(transparent)]
    MalformedMac(#[from] MalformedMac),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
