//! HTTP client utilities
//!
//! Provides a reqwest::Client configured with a timeout and crate user agent

use reqwest::Client;
use std::time::Duration;

/// Build a reqwest Client with the given timeout.
///
/// Login and logout calls go to an instrument server on the local network, so
/// no proxy configuration is applied.
pub fn client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("helmauth/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to create HTTP client")
}
