//! `/notifications` endpoints.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tracing::warn;

use donorlink_core::error::AppError;
use donorlink_core::types::id::NotificationId;
use donorlink_entity::notification::NotificationRecord;
use donorlink_entity::session::Session;
use donorlink_service::NotificationGateway;

use crate::client::HttpGateway;
use crate::error::Resource;

/// Decode a notification list, normalizing the legacy `read` field.
///
/// Entries that do not parse are dropped and logged; only a body that is
/// not a list fails.
pub fn decode_records(value: Value) -> Result<Vec<NotificationRecord>, AppError> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match NotificationRecord::from_wire(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Dropping malformed notification from listing");
                    None
                }
            })
            .collect()),
        other => Err(AppError::validation(format!(
            "Expected a notification array, got {other}"
        ))),
    }
}

/// Decode an unread count sent either bare or as `{"count": n}`.
pub fn decode_count(value: &Value) -> Result<u64, AppError> {
    value
        .as_u64()
        .or_else(|| ["count", "unreadCount"].iter().find_map(|k| value.get(*k)?.as_u64()))
        .ok_or_else(|| AppError::validation(format!("Unrecognized unread count: {value}")))
}

impl HttpGateway {
    async fn fetch_records(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        let request = self.request(Method::GET, path, session);
        let value: Value = self.send_json(request, Resource::Notification).await?;
        decode_records(value)
    }
}

#[async_trait]
impl NotificationGateway for HttpGateway {
    async fn list_notifications(
        &self,
        session: &Session,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        self.fetch_records(session, "notifications").await
    }

    async fn list_unread(&self, session: &Session) -> Result<Vec<NotificationRecord>, AppError> {
        self.fetch_records(session, "notifications/unread").await
    }

    async fn unread_count(&self, session: &Session) -> Result<u64, AppError> {
        let request = self.request(Method::GET, "notifications/unread/count", session);
        let value: Value = self.send_json(request, Resource::Notification).await?;
        decode_count(&value)
    }

    async fn mark_read(&self, session: &Session, id: NotificationId) -> Result<(), AppError> {
        let request = self.request(Method::PUT, &format!("notifications/{id}/read"), session);
        self.send_unit(request, Resource::Notification).await
    }

    async fn mark_all_read(&self, session: &Session) -> Result<(), AppError> {
        let request = self.request(Method::PUT, "notifications/read-all", session);
        self.send_unit(request, Resource::Notification).await
    }

    async fn delete(&self, session: &Session, id: NotificationId) -> Result<(), AppError> {
        let request = self.request(Method::DELETE, &format!("notifications/{id}"), session);
        self.send_unit(request, Resource::Notification).await
    }
}
