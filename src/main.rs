//! helmauth CLI
//!
//! Command-line utility over the session facade: log in to a Signal K
//! server, inspect or delete the stored token, and install device access
//! tokens. The stored connection config doubles as the credential source for
//! scheduled token renewal when the facade is embedded in a long-running
//! client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use helmauth::auth::endpoints::DEFAULT_API_PATH;
use helmauth::auth::store::default_data_dir;
use helmauth::auth::token::expiry_display;
use helmauth::cli::{Cli, Commands, LoginArgs, SetDeviceTokenArgs};
use helmauth::{ConnectionConfig, EndpointStatus, SessionConfig, SessionService, TokenStore};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity flags
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr) // Log to stderr to keep stdout clean
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    match cli.command {
        Some(Commands::Login(args)) => execute_login(data_dir, args).await,
        Some(Commands::Logout) => execute_logout(data_dir).await,
        Some(Commands::Status) => execute_status(data_dir),
        Some(Commands::SetDeviceToken(args)) => execute_set_device_token(data_dir, args),
        Some(Commands::DeleteToken) => execute_delete_token(data_dir),
        None => {
            eprintln!("Error: No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

async fn execute_login(data_dir: PathBuf, args: LoginArgs) -> Result<()> {
    let server = match args.server {
        Some(server) => server,
        None => ConnectionConfig::load(&data_dir)
            .ok()
            .and_then(|config| config.server_url)
            .context("No server address given and none stored; use --server")?,
    };
    url::Url::parse(&server).with_context(|| format!("Invalid server address: {}", server))?;

    let service = SessionService::start(SessionConfig::new(&data_dir));
    service
        .login(&args.username, &args.password, Some(server.as_str()))
        .await?;

    if !args.no_store {
        // Renewal replays login from this record
        ConnectionConfig {
            login_name: args.username.clone(),
            login_password: args.password.clone(),
            server_url: Some(server.clone()),
        }
        .save(&data_dir)?;
    }

    let token = service
        .token()
        .context("Login succeeded but no token is present")?;
    println!("Logged in to {} as {}", server, args.username);
    println!("Token expires: {}", expiry_display(token.expires_at));
    service.shutdown();
    Ok(())
}

async fn execute_logout(data_dir: PathBuf) -> Result<()> {
    let service = SessionService::start(SessionConfig::new(&data_dir));

    // Resolve the logout endpoint from the stored server address, if any
    if let Ok(config) = ConnectionConfig::load(&data_dir) {
        if let Some(server) = config.server_url {
            let api_url = format!("{}{}api/", server.trim_end_matches('/'), DEFAULT_API_PATH);
            service.handle_endpoint_status(&EndpointStatus::connected(api_url));
        }
    }

    service.logout(false).await;
    println!("Logged out; stored token cleared");
    service.shutdown();
    Ok(())
}

fn execute_status(data_dir: PathBuf) -> Result<()> {
    let store = TokenStore::new(&data_dir);
    match store.read_raw() {
        None => println!("No stored token"),
        Some(token) => {
            let kind = if token.device_scoped {
                "device access"
            } else {
                "session"
            };
            let state = if token.is_expired() { "expired" } else { "valid" };
            println!(
                "Stored {} token ({}), expires: {}",
                kind,
                state,
                expiry_display(token.expires_at)
            );
        }
    }

    match ConnectionConfig::load(&data_dir) {
        Ok(config) => println!(
            "Connection config for {} (server: {})",
            config.login_name,
            config.server_url.as_deref().unwrap_or("unknown")
        ),
        Err(_) => println!("No connection config stored"),
    }
    Ok(())
}

fn execute_set_device_token(data_dir: PathBuf, args: SetDeviceTokenArgs) -> Result<()> {
    let service = SessionService::start(SessionConfig::new(&data_dir));
    service.set_device_token(&args.token)?;

    match service.token() {
        Some(token) => println!(
            "Device access token stored, expires: {}",
            expiry_display(token.expires_at)
        ),
        // An expired incoming token is discarded without error
        None => println!("Token was expired and has been discarded"),
    }
    service.shutdown();
    Ok(())
}

fn execute_delete_token(data_dir: PathBuf) -> Result<()> {
    let service = SessionService::start(SessionConfig::new(&data_dir));
    service.delete_token();
    println!("Stored token deleted");
    service.shutdown();
    Ok(())
}
