//! Notification entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use donorlink_core::error::AppError;
use donorlink_core::types::id::{MatchId, NotificationId, UserId};

use super::kind::NotificationKind;

/// Legacy spelling of the read flag still emitted by older server builds.
const LEGACY_READ_FIELD: &str = "read";
const READ_FIELD: &str = "isRead";

/// A notification addressed to one user.
///
/// `id` is the only de-duplication key: the same notification may arrive
/// through the push channel and a REST fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// The addressee.
    pub user_id: UserId,
    /// Event type that triggered this notification.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub message: String,
    /// Whether the user has read this notification.
    #[serde(default)]
    pub is_read: bool,
    /// When the server created the notification.
    #[serde(with = "crate::timestamp::required")]
    pub created_at: DateTime<Utc>,
    /// Additional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl NotificationRecord {
    /// Parse a record from a raw backend payload.
    ///
    /// Accepts both `isRead` and the legacy `read` field; when both are
    /// present `isRead` wins.
    pub fn from_wire(mut value: Value) -> Result<Self, AppError> {
        normalize_read_alias(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// Check if the notification has not been read.
    pub fn is_unread(&self) -> bool {
        !self.is_read
    }

    /// Match referenced by `metadata.matchId`, if any.
    pub fn match_id(&self) -> Option<MatchId> {
        self.metadata
            .as_ref()?
            .get("matchId")?
            .as_str()?
            .parse()
            .ok()
    }
}

/// Rewrite the legacy `read` field to `isRead` in place.
pub fn normalize_read_alias(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        if let Some(legacy) = obj.remove(LEGACY_READ_FIELD) {
            obj.entry(READ_FIELD).or_insert(legacy);
        }
    }
}
