//! Persisted connection configuration
//!
//! Owned by the connection-setup collaborator (the CLI here); the session
//! core only reads it, to replay login during scheduled token renewal.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONNECTION_FILE: &str = "connection_config.json";

/// Connection record with the plaintext login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(rename = "loginName")]
    pub login_name: String,

    #[serde(rename = "loginPassword")]
    pub login_password: String,

    /// Server address the credentials belong to
    #[serde(rename = "serverUrl", default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

impl ConnectionConfig {
    /// Load the record from the data directory.
    ///
    /// A missing record is an error at this level; callers that can proceed
    /// without one (the renewal path) log and abort instead.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = config_path(dir);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("No connection credentials at {}", path.display()))?;
        serde_json::from_str(&data).context("Failed to parse connection config")
    }

    /// Persist the record with user-only permissions
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).context("Failed to create data directory")?;

        let path = config_path(dir);
        let data = serde_json::to_string_pretty(self)
            .context("Failed to serialize connection config")?;
        fs::write(&path, data).context("Failed to write connection config")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }
}

fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONNECTION_FILE)
}
