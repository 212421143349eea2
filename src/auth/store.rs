//! Durable persistence for the authorization token

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::token::{expiry_display, AuthorizationToken};
use crate::error::AuthError;

const TOKEN_FILE: &str = "authorization_token.json";

/// File-backed store for the `authorization_token` record.
///
/// One record at a time; a missing file is the ordinary logged-out state, not
/// an error.
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Create a store rooted at the given data directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create a store in the per-user data directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_data_dir()?))
    }

    /// Load the persisted token, applying the startup validation rules.
    ///
    /// Interactive-session tokens never survive a restart: they are cleared on
    /// load and absent is returned. A device token with an expiry in the past
    /// is likewise cleared. A device token without expiry is valid forever.
    pub fn load(&self) -> Option<AuthorizationToken> {
        let token = self.read_raw()?;

        if !token.device_scoped {
            info!("Stored session token found; interactive sessions do not survive restarts, deleting");
            self.discard();
            return None;
        }

        if token.is_expired() {
            info!("Stored device access token expired, deleting");
            self.discard();
            return None;
        }

        info!(
            "Device access token loaded, expires: {}",
            expiry_display(token.expires_at)
        );
        Some(token)
    }

    /// Read the persisted record without the startup validation rules.
    ///
    /// The renewal path uses this: it must see the interactive token that the
    /// running session persisted, which `load` would refuse to rehydrate.
    pub fn read_raw(&self) -> Option<AuthorizationToken> {
        let path = self.token_path();
        if !path.exists() {
            return None;
        }

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read token file: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("Stored token is unreadable, deleting: {}", e);
                self.discard();
                None
            }
        }
    }

    /// Persist the token, superseding any previous record
    pub fn save(&self, token: &AuthorizationToken) -> Result<(), AuthError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.token_path();
        let contents = serde_json::to_string_pretty(token)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize token: {}", e)))?;
        fs::write(&path, contents)?;

        // Token secret is sensitive; user-only permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        debug!("Authorization token persisted");
        Ok(())
    }

    /// Remove the persisted record; absent is not an error
    pub fn clear(&self) -> Result<(), AuthError> {
        let path = self.token_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn discard(&self) {
        if let Err(e) = self.clear() {
            warn!("Failed to delete stored token: {}", e);
        }
    }

    fn token_path(&self) -> PathBuf {
        self.dir.join(TOKEN_FILE)
    }

    /// Directory the store writes under
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Per-user data directory for this crate
pub fn default_data_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Cannot determine config directory")?;
    Ok(config_dir.join("helmauth"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_load_missing_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        assert!(store.load().is_none());
        assert!(store.read_raw().is_none());
    }

    #[test]
    fn test_device_token_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let token = AuthorizationToken::device("secret", Some(Utc::now().timestamp() + 3600));
        store.save(&token).unwrap();
        assert_eq!(store.load(), Some(token));
    }

    #[test]
    fn test_device_token_without_expiry_is_valid_forever() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let token = AuthorizationToken::device("secret", None);
        store.save(&token).unwrap();
        assert_eq!(store.load(), Some(token));
    }

    #[test]
    fn test_expired_device_token_cleared_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let token = AuthorizationToken::device("secret", Some(Utc::now().timestamp() - 10));
        store.save(&token).unwrap();
        assert!(store.load().is_none());
        // The record itself is gone, not just filtered
        assert!(store.read_raw().is_none());
    }

    #[test]
    fn test_session_token_never_rehydrates() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let token = AuthorizationToken::session("secret", Some(Utc::now().timestamp() + 3600));
        store.save(&token).unwrap();
        assert!(store.load().is_none());
        assert!(store.read_raw().is_none());
    }

    #[test]
    fn test_read_raw_skips_startup_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let token = AuthorizationToken::session("secret", Some(Utc::now().timestamp() + 3600));
        store.save(&token).unwrap();
        assert_eq!(store.read_raw(), Some(token));
    }

    #[test]
    fn test_unparseable_record_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(TOKEN_FILE), "{ not json").unwrap();
        assert!(store.read_raw().is_none());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        store.clear().unwrap();
        store.clear().unwrap();
    }
}
