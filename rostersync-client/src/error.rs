//! Error types for rostersync-client.

use thiserror::Error;

/// Failure of a single call into the authentication service or row store.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response (DNS, TLS, timeout, ...).
    #[error("{endpoint}: transport error: {message}")]
    Transport { endpoint: String, message: String },

    /// The service answered with a non-success status.
    #[error("{endpoint}: HTTP {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode {what}: {message}")]
    Decode { what: &'static str, message: String },

    /// An update or delete matched no record.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation needs a key that was not configured.
    #[error("operation requires {0}, which is not configured")]
    NotConfigured(&'static str),
}

impl ClientError {
    /// HTTP status code, when the service returned one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
