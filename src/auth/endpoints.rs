//! Auth endpoint resolution from connectivity status events
//!
//! The connection layer discovers the server's HTTP service address at
//! runtime and publishes it as status events. The resolver derives the three
//! auth URLs from the most recent "endpoint known" event; until one arrives
//! the set is unresolved and login needs an explicit server address.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tracing::debug;

/// Default versioned API path, used when logging in against an explicit
/// server address before the connection layer has resolved endpoints
pub const DEFAULT_API_PATH: &str = "/signalk/v1/";

const LOGIN_SUFFIX: &str = "auth/login";
const LOGOUT_SUFFIX: &str = "auth/logout";
const VALIDATE_SUFFIX: &str = "auth/validate";

/// Connectivity lifecycle stage reported by the connection layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointOperation {
    /// No connection activity
    Stopped,
    /// Connection attempt in progress
    Connecting,
    /// Service endpoint discovered and usable
    Connected,
    /// Connection attempt failed
    Error,
}

/// One connectivity status event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub operation: EndpointOperation,
    /// Versioned HTTP API address, e.g. `http://host:3000/signalk/v1/api/`
    pub http_service_url: Option<String>,
}

impl EndpointStatus {
    /// The "service endpoint known" event for a resolved address
    pub fn connected(http_service_url: impl Into<String>) -> Self {
        Self {
            operation: EndpointOperation::Connected,
            http_service_url: Some(http_service_url.into()),
        }
    }
}

/// The three auth URLs, always derived together from one base address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    pub login: String,
    pub logout: String,
    pub validate: String,
}

impl EndpointSet {
    /// Derive the set from the versioned HTTP API address.
    ///
    /// The trailing `api/` segment of the service address is the general data
    /// API; the auth routes hang off the path above it.
    pub fn derive(http_service_url: &str) -> Self {
        let base = http_service_url
            .strip_suffix("api/")
            .unwrap_or(http_service_url);
        Self {
            login: format!("{}{}", base, LOGIN_SUFFIX),
            logout: format!("{}{}", base, LOGOUT_SUFFIX),
            validate: format!("{}{}", base, VALIDATE_SUFFIX),
        }
    }
}

/// Build a login URL from an explicit server address, bypassing resolution.
///
/// Trailing slashes are stripped and the default API path appended; used for
/// first-time connection setup where the caller supplies the address directly.
pub fn override_login_url(address: &str) -> String {
    format!(
        "{}{}{}",
        address.trim_end_matches('/'),
        DEFAULT_API_PATH,
        LOGIN_SUFFIX
    )
}

/// Tracks the currently resolved endpoint set.
///
/// The whole set is swapped in one write; readers never observe a partially
/// derived state.
#[derive(Default)]
pub struct EndpointResolver {
    set: RwLock<Option<EndpointSet>>,
}

impl EndpointResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one connectivity status event
    pub fn observe(&self, status: &EndpointStatus) {
        if status.operation != EndpointOperation::Connected {
            return;
        }
        let Some(url) = status.http_service_url.as_deref() else {
            return;
        };

        let set = EndpointSet::derive(url);
        debug!("Auth endpoints resolved: {}", set.login);
        *self.set.write().expect("endpoint lock poisoned") = Some(set);
    }

    /// The current endpoint set, if the server address has been resolved
    pub fn endpoints(&self) -> Option<EndpointSet> {
        self.set.read().expect("endpoint lock poisoned").clone()
    }
}
