//! CLI command definitions and dispatch.

pub mod auth;
pub mod config;
pub mod matches;
pub mod notifications;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use donorlink_auth::{SessionFile, SessionStore};
use donorlink_core::config::AppConfig;
use donorlink_core::error::AppError;
use donorlink_gateway::HttpGateway;

/// DonorLink: match confirmations and notifications from the terminal
#[derive(Debug, Parser)]
#[command(name = "donorlink", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Environment overlay (e.g. `production` loads `config/production.toml`)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Store a session for subsequent commands
    Login(auth::LoginArgs),
    /// Forget the stored session
    Logout,
    /// Show the stored session
    Whoami,
    /// List and act on matches
    Matches(matches::MatchesArgs),
    /// List and manage notifications
    Notifications(notifications::NotificationsArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = load_config(&self.config, self.env.as_deref())?;
        match &self.command {
            Commands::Login(args) => auth::login(args, &config).await,
            Commands::Logout => auth::logout(&config).await,
            Commands::Whoami => auth::whoami(&config, self.format).await,
            Commands::Matches(args) => matches::execute(args, &config, self.format).await,
            Commands::Notifications(args) => {
                notifications::execute(args, &config, self.format).await
            }
            Commands::Config(args) => config::execute(args, &config, &self.config, self.format),
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(path: &str, env: Option<&str>) -> Result<AppConfig, AppError> {
    AppConfig::load(path, env)
}

/// Helper: the session file named in configuration
pub fn session_file(config: &AppConfig) -> SessionFile {
    SessionFile::new(&config.session.file)
}

/// Helper: a session store holding the saved session, or an error asking
/// the user to log in
pub async fn logged_in(config: &AppConfig) -> Result<SessionStore, AppError> {
    let session = session_file(config)
        .load()
        .await?
        .ok_or_else(AppError::session_required)?;
    Ok(SessionStore::with_session(session))
}

/// Helper: REST gateway from config
pub fn gateway(config: &AppConfig) -> Result<Arc<HttpGateway>, AppError> {
    Ok(Arc::new(HttpGateway::new(&config.api)?))
}
