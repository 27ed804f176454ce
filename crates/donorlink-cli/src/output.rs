//! Table and JSON output formatting for CLI commands.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tabled::{Table, Tabled};

use donorlink_core::error::{AppError, ErrorKind};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of rows in the selected format
pub fn print_list<T: Serialize + Tabled>(rows: &[T], format: OutputFormat, empty: &str) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{empty}");
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => print_json(&rows, "[]"),
    }
}

/// Print a serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T, fallback: &str) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| fallback.to_string());
    println!("{json}");
}

pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠ {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}

/// Local wall-clock rendering of a server timestamp.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn optional_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(timestamp).unwrap_or_else(|| "-".to_string())
}

/// First eight characters of an id, for narrow tables.
pub fn short_id(id: impl std::fmt::Display) -> String {
    id.to_string().chars().take(8).collect()
}

/// The message a user should see for an error.
pub fn describe_error(err: &AppError) -> String {
    match (err.kind, err.code) {
        (ErrorKind::Authentication, _) => {
            "Your session is missing or has expired. Please log in again.".to_string()
        }
        (_, Some(code)) => format!("{} [{}]", err.message, code),
        (ErrorKind::Network, None) => format!("Could not reach the server: {}", err.message),
        _ => err.to_string(),
    }
}
