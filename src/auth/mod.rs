//! Authentication and session lifecycle

pub mod connection;
pub mod endpoints;
pub mod session;
pub mod store;
pub mod token;

pub use connection::ConnectionConfig;
pub use endpoints::{EndpointOperation, EndpointResolver, EndpointSet, EndpointStatus};
pub use session::{SessionConfig, SessionService, DEFAULT_RENEWAL_BUFFER_SECS};
pub use store::TokenStore;
pub use token::AuthorizationToken;
