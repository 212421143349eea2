//! Error types for the session lifecycle client

use thiserror::Error;

/// Failures surfaced by the session facade.
///
/// Logout transport errors and expired tokens issued by the server are not
/// represented here: both are swallowed at the facade (logged only) and never
/// reach a caller.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No resolved login URL and no override address was supplied.
    #[error("No login endpoint available; server address not yet resolved")]
    NoTargetEndpoint,

    /// Transport-level failure talking to the server.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered the login call with a non-success status.
    #[error("Server rejected login with status {status}: {body}")]
    ServerRejected { status: u16, body: String },

    /// The bearer token's payload segment could not be decoded.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Persisting or clearing the stored token failed.
    #[error("Token storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        AuthError::Storage(err.to_string())
    }
}
