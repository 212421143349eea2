//! Session facade and proactive token renewal
//!
//! One `SessionService` instance lives for the whole process and is passed to
//! every collaborator that needs credential or login/logout access. All
//! session-state mutations funnel through its operations; collaborators
//! observe state through watch channels.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::connection::ConnectionConfig;
use super::endpoints::{override_login_url, EndpointResolver, EndpointSet, EndpointStatus};
use super::store::TokenStore;
use super::token::{decode_expiry, epoch_expired, expiry_display, AuthorizationToken};
use crate::error::AuthError;
use crate::http::client_with_timeout;

/// Seconds before token expiry at which proactive renewal is attempted
pub const DEFAULT_RENEWAL_BUFFER_SECS: i64 = 60;

/// Construction parameters for [`SessionService`]
pub struct SessionConfig {
    /// Directory holding the token record and connection config
    pub data_dir: PathBuf,
    /// Renewal window before expiry, in seconds
    pub renewal_buffer_secs: i64,
    /// Timeout applied to login/logout calls
    pub http_timeout: Duration,
}

impl SessionConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            renewal_buffer_secs: DEFAULT_RENEWAL_BUFFER_SECS,
            http_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Authentication and session lifecycle manager.
///
/// Owns the authoritative `{logged_in, token}` state. `logged_in` becomes
/// true only through a successful interactive login; a device access token
/// grants API access without constituting a session.
pub struct SessionService {
    client: reqwest::Client,
    store: TokenStore,
    resolver: EndpointResolver,
    renewal_buffer: i64,
    /// Re-entrancy guard: set for the duration of one renewal attempt
    renewing: AtomicBool,
    logged_in_tx: watch::Sender<bool>,
    token_tx: watch::Sender<Option<AuthorizationToken>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionService {
    /// Create the service and start its renewal scheduler.
    ///
    /// The store is consulted once at startup: a valid device access token is
    /// rehydrated into session state (without logging in), anything else is
    /// cleared.
    pub fn start(config: SessionConfig) -> Arc<Self> {
        let store = TokenStore::new(&config.data_dir);
        let initial = store.load();

        let (logged_in_tx, _) = watch::channel(false);
        let (token_tx, _) = watch::channel(initial);

        let service = Arc::new(Self {
            client: client_with_timeout(config.http_timeout),
            store,
            resolver: EndpointResolver::new(),
            renewal_buffer: config.renewal_buffer_secs,
            renewing: AtomicBool::new(false),
            logged_in_tx,
            token_tx,
            tasks: Mutex::new(Vec::new()),
        });

        let scheduler = tokio::spawn(renewal_loop(
            Arc::downgrade(&service),
            service.renewal_buffer,
            service.token_tx.subscribe(),
        ));
        service.push_task(scheduler);

        service
    }

    /// Apply one connectivity status event synchronously.
    ///
    /// Callers that drive the connection layer directly use this; it
    /// guarantees the endpoint set is updated before any subsequent login.
    pub fn handle_endpoint_status(&self, status: &EndpointStatus) {
        self.resolver.observe(status);
    }

    /// Follow a push-based connectivity status stream.
    ///
    /// The current value is applied immediately, then every change until the
    /// sender goes away or the session shuts down.
    pub fn attach_endpoint_stream(self: &Arc<Self>, mut rx: watch::Receiver<EndpointStatus>) {
        let weak = Arc::downgrade(self);
        let forwarder = tokio::spawn(async move {
            loop {
                let status = rx.borrow_and_update().clone();
                match weak.upgrade() {
                    Some(service) => service.resolver.observe(&status),
                    None => break,
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });
        self.push_task(forwarder);
    }

    /// The currently resolved auth endpoints, if any
    pub fn endpoints(&self) -> Option<EndpointSet> {
        self.resolver.endpoints()
    }

    /// True after a successful interactive login
    pub fn logged_in(&self) -> bool {
        *self.logged_in_tx.borrow()
    }

    /// The current authorization token, if any
    pub fn token(&self) -> Option<AuthorizationToken> {
        self.token_tx.borrow().clone()
    }

    /// Observe login-state changes
    pub fn subscribe_logged_in(&self) -> watch::Receiver<bool> {
        self.logged_in_tx.subscribe()
    }

    /// Observe token changes
    pub fn subscribe_token(&self) -> watch::Receiver<Option<AuthorizationToken>> {
        self.token_tx.subscribe()
    }

    /// Log in with username and password.
    ///
    /// `override_address` targets an explicit server (normalized with the
    /// default API path) and takes precedence over the resolved login URL;
    /// it is the only way to log in before the first endpoint event. An
    /// existing session is replaced: the old one is logged out internally
    /// and the externally observed outcome is that of this login alone.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        override_address: Option<&str>,
    ) -> Result<(), AuthError> {
        let target = match override_address {
            Some(address) => Some(override_login_url(address)),
            None => self.resolver.endpoints().map(|set| set.login),
        };

        if self.logged_in() {
            // Login replacement, not a user-visible logout
            self.logout(true).await;
        }

        let Some(url) = target else {
            error!("Login URL is not set; cannot perform login");
            self.delete_token();
            return Err(AuthError::NoTargetEndpoint);
        };

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                self.delete_token();
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Server rejected login with status {}: {}", status, body);
            self.delete_token();
            return Err(AuthError::ServerRejected {
                status: status.as_u16(),
                body,
            });
        }

        let login: LoginResponse = match response.json().await {
            Ok(login) => login,
            Err(e) => {
                self.delete_token();
                return Err(AuthError::Network(format!(
                    "Failed to parse login response: {}",
                    e
                )));
            }
        };

        info!("User {} login successful", username);
        match self.commit_session(&login.token) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.delete_token();
                Err(e)
            }
        }
    }

    /// Log out of the current session.
    ///
    /// Storage is always cleared and the server logout is attempted; a
    /// transport failure is logged, never propagated — local state is
    /// authoritative. During a login replacement the in-memory token is left
    /// untouched so the renewal wiring is not disturbed mid-flight.
    pub async fn logout(&self, is_login_replacement: bool) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear stored token: {}", e);
        }

        match self.resolver.endpoints() {
            Some(set) => match self.client.put(&set.logout).send().await {
                Ok(response) if response.status().is_success() => {
                    info!("User logged out");
                }
                Ok(response) => {
                    error!("Server logout returned status {}", response.status());
                }
                Err(e) => {
                    error!("Server logout failed: {}", e);
                }
            },
            None => {
                error!("Logout URL is not set; skipping server logout");
            }
        }

        self.logged_in_tx.send_replace(false);
        if !is_login_replacement {
            self.token_tx.send_replace(None);
        }
    }

    /// Unconditionally clear both persisted and in-memory credential state
    pub fn delete_token(&self) {
        debug!("Deleting authorization token");
        if let Err(e) = self.store.clear() {
            warn!("Failed to clear stored token: {}", e);
        }
        self.logged_in_tx.send_replace(false);
        self.token_tx.send_replace(None);
    }

    /// Install a device access token.
    ///
    /// Decoded like a login token but never transitions the session to
    /// logged-in; the flag is left as it was. An expired incoming token is
    /// discarded without any state change.
    pub fn set_device_token(&self, bearer: &str) -> Result<(), AuthError> {
        let expiry = decode_expiry(bearer)?;
        if let Some(exp) = expiry {
            if epoch_expired(exp) {
                info!("Received expired device access token from server; discarding");
                return Ok(());
            }
        }

        let token = AuthorizationToken::device(bearer, expiry);
        self.store.save(&token)?;
        info!(
            "Device access token received, expires: {}",
            expiry_display(expiry)
        );
        self.token_tx.send_replace(Some(token));
        Ok(())
    }

    /// Release the scheduler and any endpoint forwarder tasks
    pub fn shutdown(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }

    /// Commit a bearer string returned by the login call.
    ///
    /// An already-expired token from the server is a protocol anomaly and is
    /// silently discarded: no state change, no error. Persistence happens
    /// before the in-memory update so a storage failure leaves the previous
    /// state intact.
    fn commit_session(&self, bearer: &str) -> Result<(), AuthError> {
        let expiry = decode_expiry(bearer)?;
        if let Some(exp) = expiry {
            if epoch_expired(exp) {
                info!("Received expired session token from server; discarding");
                return Ok(());
            }
        }

        let token = AuthorizationToken::session(bearer, expiry);
        self.store.save(&token)?;
        info!("Session token received, expires: {}", expiry_display(expiry));
        self.token_tx.send_replace(Some(token));
        self.logged_in_tx.send_replace(true);
        Ok(())
    }

    /// One renewal attempt, gated by the re-entrancy guard.
    ///
    /// A trigger arriving while an attempt is in flight is dropped, not
    /// queued. User-initiated operations are never blocked by the guard;
    /// their outcome supersedes whatever the in-flight renewal produces.
    async fn renew_token(&self) {
        if self
            .renewing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Token renewal already in progress; dropping trigger");
            return;
        }

        self.run_renewal().await;
        self.renewing.store(false, Ordering::Release);
    }

    async fn run_renewal(&self) {
        let Some(token) = self.store.read_raw() else {
            warn!("No stored token; nothing to renew");
            return;
        };

        if token.device_scoped {
            warn!("Device access token expiring; manual reissue required");
            return;
        }

        if token.is_expired() {
            info!("Session token already expired; cannot renew");
            return;
        }

        info!("Session token expires soon; renewing");
        let config = match ConnectionConfig::load(self.store.dir()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Cannot renew session: {:#}", e);
                return;
            }
        };

        // On failure the scheduler stays idle until the next credential
        // change; there is no self-retry against a rejecting server.
        match self
            .login(&config.login_name, &config.login_password, None)
            .await
        {
            Ok(()) => info!("Session token renewed"),
            Err(e) => error!("Token renewal failed: {}", e),
        }
    }

    fn push_task(&self, handle: JoinHandle<()>) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(handle);
        }
    }
}

impl Drop for SessionService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Renewal scheduler: arms a one-shot timer whenever the token changes to one
/// with a new expiry value, firing `buffer` seconds before expiry (clamped to
/// now). One task owns the timer, so re-arming is atomic with credential
/// replacement and two timers can never coexist for a session.
async fn renewal_loop(
    weak: Weak<SessionService>,
    buffer: i64,
    mut rx: watch::Receiver<Option<AuthorizationToken>>,
) {
    let mut last_expiry = rx.borrow_and_update().as_ref().and_then(|t| t.expires_at);
    let mut armed = last_expiry;
    if let Some(exp) = armed {
        debug!(
            "Renewal timer armed for {} (buffer {}s)",
            expiry_display(Some(exp)),
            buffer
        );
    }

    loop {
        // Absolute deadline, recomputed from the armed expiry each pass
        let delay = armed.map(|exp| {
            let seconds = exp - buffer - Utc::now().timestamp();
            Duration::from_secs(seconds.max(0) as u64)
        });

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let expiry = rx.borrow_and_update().as_ref().and_then(|t| t.expires_at);
                // Distinct-until-changed on the expiry value: a token carrying
                // the same expiry leaves the timer state alone
                if expiry != last_expiry {
                    last_expiry = expiry;
                    armed = expiry;
                    match expiry {
                        Some(exp) => debug!(
                            "Renewal timer armed for {} (buffer {}s)",
                            expiry_display(Some(exp)),
                            buffer
                        ),
                        None => debug!("Renewal timer disarmed"),
                    }
                }
            }
            _ = tokio::time::sleep(delay.unwrap_or_default()), if delay.is_some() => {
                armed = None;
                let Some(service) = weak.upgrade() else {
                    break;
                };
                service.renew_token().await;
            }
        }
    }
}
