//! Notification type enumeration.

use serde::{Deserialize, Serialize};

/// Domain event that produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A donation matching the user's interests was posted.
    NewDonation,
    /// A receive-request matching the user's interests was posted.
    NewRequest,
    /// A donation, request, or match was cancelled.
    Cancellation,
    /// The matching engine paired one of the user's items.
    MatchFound,
    /// Operational or account message.
    System,
    /// A type this client does not know about yet.
    #[serde(other)]
    Other,
}

impl NotificationKind {
    /// Whether this notification can change the state of one of the user's matches.
    pub fn affects_matches(&self) -> bool {
        matches!(self, Self::MatchFound | Self::Cancellation)
    }

    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewDonation => "new_donation",
            Self::NewRequest => "new_request",
            Self::Cancellation => "cancellation",
            Self::MatchFound => "match_found",
            Self::System => "system",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
