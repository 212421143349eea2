//! helmauth: authentication and session lifecycle client for Signal K
//! marine data servers
//!
//! The crate keeps one authenticated session alive against a server whose
//! address can change at runtime: it resolves the auth endpoints from
//! connectivity status events, performs login/logout, persists the current
//! authorization token, and renews it shortly before expiry. UI collaborators
//! consume the session through [`auth::SessionService`].

pub mod auth;
pub mod cli;
pub mod error;
pub mod http;

pub use auth::{
    AuthorizationToken, ConnectionConfig, EndpointOperation, EndpointResolver, EndpointSet,
    EndpointStatus, SessionConfig, SessionService, TokenStore, DEFAULT_RENEWAL_BUFFER_SECS,
};
pub use error::AuthError;
