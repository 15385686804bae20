//! Common error types for CirrusDrive.

use thiserror::Error;

/// Top-level error type for CirrusDrive operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The identity provider rejected the refresh token or the authentication
    /// flow failed. The session cannot recover on its own; the user must
    /// re-authenticate.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The API rejected the request as unauthorized even after a token
    /// refresh. Same remedy as `Authentication`.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found (stale id, item deleted by another client).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Name collision the remote API did not resolve.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Connection, DNS, or timeout failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Unexpected HTTP status, carrying the response body for diagnosis.
    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this failure invalidates the session, forcing the user to run
    /// the authentication flow again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Error::Authentication(_) | Error::Unauthorized(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
