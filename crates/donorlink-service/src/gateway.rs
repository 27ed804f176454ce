//! Contracts for the remote backend.
//!
//! Every call carries the caller's [`Session`]; implementations attach the
//! bearer credential and user id. Failures come back already classified as
//! [`AppError`]s so callers never inspect transport details.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use donorlink_core::error::AppError;
use donorlink_core::types::id::{MatchId, NotificationId};
use donorlink_entity::matching::{CompletionDetails, MatchResult, Party};
use donorlink_entity::notification::NotificationRecord;
use donorlink_entity::session::Session;

/// Which of the caller's matches to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchFilter {
    /// Matches where the caller is the donor.
    AsDonor,
    /// Matches where the caller is the recipient.
    AsRecipient,
    /// Non-terminal matches on either side.
    Active,
    /// Matches nobody has confirmed yet.
    Pending,
    /// Matches both sides have confirmed.
    Confirmed,
}

impl MatchFilter {
    /// Path segment under `/matching/my-matches/`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::AsDonor => "as-donor",
            Self::AsRecipient => "as-recipient",
            Self::Active => "active",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
        }
    }

    /// The listing that contains every match where the caller plays `party`.
    pub fn for_party(party: Party) -> Self {
        match party {
            Party::Donor => Self::AsDonor,
            Party::Recipient => Self::AsRecipient,
        }
    }
}

impl fmt::Display for MatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Remote match endpoints.
#[async_trait]
pub trait MatchGateway: Send + Sync + 'static {
    /// List the caller's matches.
    async fn list_matches(
        &self,
        session: &Session,
        filter: MatchFilter,
    ) -> Result<Vec<MatchResult>, AppError>;

    /// Confirm the match as `party`.
    async fn confirm(&self, session: &Session, party: Party, id: MatchId) -> Result<(), AppError>;

    /// Reject the match as `party`.
    async fn reject(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        reason: &str,
    ) -> Result<(), AppError>;

    /// Withdraw `party`'s confirmation.
    async fn withdraw(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        reason: &str,
    ) -> Result<(), AppError>;

    /// Record completion (recipient only).
    async fn confirm_completion(
        &self,
        session: &Session,
        id: MatchId,
        details: &CompletionDetails,
    ) -> Result<(), AppError>;

    /// Ask the server whether completion may be initiated now.
    async fn can_confirm_completion(
        &self,
        session: &Session,
        id: MatchId,
    ) -> Result<bool, AppError>;

    /// Fetch a single match by scanning `party`'s listing.
    ///
    /// The backend has no single-match endpoint.
    async fn find_match(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
    ) -> Result<Option<MatchResult>, AppError> {
        let matches = self
            .list_matches(session, MatchFilter::for_party(party))
            .await?;
        Ok(matches.into_iter().find(|m| m.match_id == id))
    }
}

/// Remote notification endpoints.
#[async_trait]
pub trait NotificationGateway: Send + Sync + 'static {
    /// All notifications, most recent first.
    async fn list_notifications(
        &self,
        session: &Session,
    ) -> Result<Vec<NotificationRecord>, AppError>;

    /// Unread notifications only.
    async fn list_unread(&self, session: &Session) -> Result<Vec<NotificationRecord>, AppError>;

    /// The server's unread count.
    async fn unread_count(&self, session: &Session) -> Result<u64, AppError>;

    /// Mark one notification read.
    async fn mark_read(&self, session: &Session, id: NotificationId) -> Result<(), AppError>;

    /// Mark every notification read.
    async fn mark_all_read(&self, session: &Session) -> Result<(), AppError>;

    /// Delete one notification.
    async fn delete(&self, session: &Session, id: NotificationId) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_paths() {
        assert_eq!(MatchFilter::AsDonor.path_segment(), "as-donor");
        assert_eq!(MatchFilter::for_party(Party::Recipient), MatchFilter::AsRecipient);
        assert_eq!(MatchFilter::Confirmed.to_string(), "confirmed");
    }
}
