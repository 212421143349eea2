//! CLI argument definitions
//!
//! Command-line surface for driving the session facade directly

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// helmauth CLI
#[derive(Parser)]
#[command(name = "helmauth")]
#[command(about = "Signal K authentication and session utility", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Override the directory holding the token and connection records
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in to a server and store the session token
    Login(LoginArgs),
    /// End the current session and clear the stored token
    Logout,
    /// Show the stored token and connection state
    Status,
    /// Install a device access token issued by the server
    SetDeviceToken(SetDeviceTokenArgs),
    /// Delete the stored token without contacting the server
    DeleteToken,
}

/// Login command arguments
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Server address, e.g. http://boat.local:3000 (defaults to the stored
    /// connection config)
    #[arg(short = 's', long)]
    pub server: Option<String>,

    /// Login name
    #[arg(short = 'u', long)]
    pub username: String,

    /// Password
    #[arg(short = 'p', long, env = "HELMAUTH_PASSWORD")]
    pub password: String,

    /// Do not store the credentials for scheduled renewal
    #[arg(long)]
    pub no_store: bool,
}

/// Device token command arguments
#[derive(Parser, Debug)]
pub struct SetDeviceTokenArgs {
    /// The bearer token string issued for this device
    pub token: String,
}
