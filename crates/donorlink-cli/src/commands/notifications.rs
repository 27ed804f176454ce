//! Notification CLI commands.

use std::sync::Arc;

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use crate::output::{self, OutputFormat};
use donorlink_core::config::AppConfig;
use donorlink_core::error::AppError;
use donorlink_core::types::id::NotificationId;
use donorlink_entity::notification::NotificationRecord;
use donorlink_realtime::{NotificationSync, WsConnector};
use donorlink_service::NotificationGateway;

/// Arguments for notification commands
#[derive(Debug, Args)]
pub struct NotificationsArgs {
    /// Notification subcommand
    #[command(subcommand)]
    pub command: NotificationCommand,
}

/// Notification subcommands
#[derive(Debug, Subcommand)]
pub enum NotificationCommand {
    /// List notifications
    List {
        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },
    /// Show the unread count
    Count,
    /// Mark one notification read
    Read {
        /// Notification ID
        id: String,
    },
    /// Mark every notification read
    ReadAll,
    /// Delete a notification
    Delete {
        /// Notification ID
        id: String,
    },
    /// Stream notifications as they arrive (Ctrl-C to stop)
    Watch,
}

/// Notification display row
#[derive(Debug, Serialize, Tabled)]
struct NotificationRow {
    /// Notification ID
    id: String,
    /// Unread marker
    new: String,
    /// Type
    kind: String,
    /// Title
    title: String,
    /// Message
    message: String,
    /// Received
    created: String,
}

impl From<&NotificationRecord> for NotificationRow {
    fn from(n: &NotificationRecord) -> Self {
        Self {
            id: n.id.to_string(),
            new: if n.is_unread() { "●" } else { "" }.to_string(),
            kind: n.kind.to_string(),
            title: n.title.clone(),
            message: n.message.clone(),
            created: output::timestamp(n.created_at),
        }
    }
}

/// Execute notification commands
pub async fn execute(
    args: &NotificationsArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let sessions = super::logged_in(config).await?;
    let session = sessions.require()?;
    let gateway = super::gateway(config)?;

    match &args.command {
        NotificationCommand::List { unread } => {
            let records = if *unread {
                gateway.list_unread(&session).await?
            } else {
                gateway.list_notifications(&session).await?
            };
            let rows: Vec<NotificationRow> = records.iter().map(NotificationRow::from).collect();
            output::print_list(&rows, format, "No notifications.");
        }
        NotificationCommand::Count => {
            let count = gateway.unread_count(&session).await?;
            match format {
                OutputFormat::Json => output::print_json(&serde_json::json!({ "unread": count }), "{}"),
                OutputFormat::Table => println!("{count} unread"),
            }
        }
        NotificationCommand::Read { id } => {
            let id = parse_id(id)?;
            gateway.mark_read(&session, id).await?;
            output::print_success("Marked as read");
        }
        NotificationCommand::ReadAll => {
            gateway.mark_all_read(&session).await?;
            output::print_success("All notifications marked as read");
        }
        NotificationCommand::Delete { id } => {
            let id = parse_id(id)?;
            gateway.delete(&session, id).await?;
            output::print_success("Notification deleted");
        }
        NotificationCommand::Watch => {
            let connector = Arc::new(WsConnector::new(config.realtime.ws_url.clone()));
            let sync = NotificationSync::new(connector, gateway, config.realtime.clone());
            let mut arrivals = sync.subscribe_arrivals();
            sync.start(Arc::clone(&session)).await?;
            output::print_success(&format!(
                "Watching notifications ({} unread). Press Ctrl-C to stop.",
                sync.unread_count()
            ));

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    arrival = arrivals.recv() => match arrival {
                        Ok(record) => print_arrival(&record, format, sync.unread_count()),
                        Err(RecvError::Lagged(missed)) => {
                            output::print_warning(&format!("Skipped {missed} notifications"));
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }

            sync.stop();
            let metrics = sync.channel_metrics();
            tracing::info!(
                connects = metrics.connects,
                delivered = metrics.delivered,
                dropped = metrics.dropped,
                "Watch ended"
            );
        }
    }

    Ok(())
}

fn print_arrival(record: &NotificationRecord, format: OutputFormat, unread: u64) {
    match format {
        OutputFormat::Json => match serde_json::to_string(record) {
            Ok(line) => println!("{line}"),
            Err(e) => output::print_error(&format!("Unprintable notification: {e}")),
        },
        OutputFormat::Table => {
            println!(
                "[{}] {}: {} ({} unread)",
                output::timestamp(record.created_at),
                record.title,
                record.message,
                unread
            );
        }
    }
}

fn parse_id(raw: &str) -> Result<NotificationId, AppError> {
    raw.trim()
        .parse()
        .map_err(|e| AppError::validation(format!("Invalid notification id '{raw}': {e}")))
}
