//! Configuration CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use donorlink_core::config::AppConfig;
use donorlink_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config: &AppConfig,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => match format {
            OutputFormat::Json => output::print_json(config, "{}"),
            OutputFormat::Table => {
                println!("Configuration from '{config_path}':");
                output::print_kv("API base URL", &config.api.base_url);
                output::print_kv(
                    "Request timeout",
                    &format!("{}s", config.api.request_timeout_seconds),
                );
                output::print_kv("Push endpoint", &config.realtime.ws_url);
                output::print_kv(
                    "Heartbeats",
                    &format!(
                        "{}ms out / {}ms in",
                        config.realtime.heartbeat_outgoing_ms, config.realtime.heartbeat_incoming_ms
                    ),
                );
                output::print_kv(
                    "Reconnect delay",
                    &format!("{}ms", config.realtime.reconnect_delay_ms),
                );
                output::print_kv(
                    "Minimum reason length",
                    &config.matching.min_reason_length.to_string(),
                );
                output::print_kv("Session file", &config.session.file);
                output::print_kv("Log level", &config.logging.level);
            }
        },
    }

    Ok(())
}
