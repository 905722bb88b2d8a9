//! Error types for the engine client.
//!
//! # Design
//! Validation failures raised by the configuration and context builders land
//! in `Argument`. Lifecycle misuse of a resource handle is `Container` or
//! `Image`. Bodies that do not parse the way an operation anticipates are
//! `UnexpectedResponse`. Everything else mirrors the HTTP status class the
//! engine answered with, so callers can distinguish "does not exist" from
//! "the engine rejected the request" from "the engine failed".

use thiserror::Error;

/// Errors returned by the client, its middleware chain, and its builders.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed caller input: bad port, volume, device, memory, restart
    /// policy or network-mode syntax, missing files, unknown CLI flags.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// A container handle was used in a state that does not allow the operation.
    #[error("container error: {0}")]
    Container(String),

    /// An image build or image handle failed.
    #[error("image error: {0}")]
    Image(String),

    /// The response body did not parse as anticipated, or an expected marker
    /// was missing from streamed output.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The engine returned 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The engine returned 404.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The engine returned 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other 4xx status.
    #[error("client error (HTTP {status}): {body}")]
    Client { status: u16, body: String },

    /// Any 5xx status.
    #[error("server error (HTTP {status}): {body}")]
    Server { status: u16, body: String },

    /// A status outside the expected set that is neither 4xx nor 5xx.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The transport could not reach the engine or lost the connection.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The transport gave up waiting for the engine.
    #[error("request timed out")]
    Timeout,

    /// A request payload could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Map a status code outside the expected set to its error class.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => ApiError::Unauthorized(body),
            404 => ApiError::NotFound(body),
            409 => ApiError::Conflict(body),
            400..=499 => ApiError::Client { status, body },
            500..=599 => ApiError::Server { status, body },
            _ => ApiError::Http { status, body },
        }
    }
}
