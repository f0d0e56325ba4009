//! Error types for the endpoint side.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from calls to the signalling server.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure or timeout talking to the server.
    #[error("request to signalling server failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server no longer tracks this client (unknown or expired id).
    #[error("client {0} is not registered")]
    NotFound(String),

    /// Any other non-success status.
    #[error("{endpoint} failed: status {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: String,
    },

    /// The server base URL is not an http(s) URL.
    #[error("invalid signalling server URL '{0}'")]
    InvalidUrl(String),

    /// A 200 response that does not carry what the call needs.
    #[error("unexpected response from signalling server: {0}")]
    BadResponse(String),
}

/// Result type alias for signalling client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Outcome of a connection sweep that reached nobody.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// No discovered peer (other than ourselves) accepted a connection.
    #[error("no peer reachable ({attempted} candidate(s) attempted)")]
    NoPeerReachable { attempted: usize },

    #[error(transparent)]
    Discovery(#[from] ClientError),
}
