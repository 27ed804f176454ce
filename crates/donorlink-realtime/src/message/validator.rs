//! Inbound message validation.

use donorlink_core::error::AppError;
use donorlink_entity::notification::NotificationRecord;

/// Maximum accepted MESSAGE body size in bytes.
const MAX_MESSAGE_SIZE: usize = 65_536;

/// Validates a raw MESSAGE body before parsing.
pub fn validate_body(raw: &str) -> Result<(), AppError> {
    if raw.len() > MAX_MESSAGE_SIZE {
        return Err(AppError::validation(format!(
            "Message exceeds maximum size of {MAX_MESSAGE_SIZE} bytes"
        )));
    }

    if raw.trim().is_empty() {
        return Err(AppError::validation("Empty message"));
    }

    Ok(())
}

/// Parses a MESSAGE body into a notification.
///
/// The legacy `read` field is normalized to `isRead` here, at the boundary.
pub fn parse_notification(raw: &str) -> Result<NotificationRecord, AppError> {
    validate_body(raw)?;
    let value: serde_json::Value = serde_json::from_str(raw)?;
    NotificationRecord::from_wire(value)
}
