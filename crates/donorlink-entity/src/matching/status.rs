//! Match lifecycle status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::party::Party;

/// Status of a match in the confirmation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    /// Proposed; neither party has confirmed.
    Pending,
    /// Only the donor has confirmed.
    DonorConfirmed,
    /// Only the recipient has confirmed.
    RecipientConfirmed,
    /// Both parties have confirmed.
    Confirmed,
    /// The recipient attested receipt.
    Completed,
    /// A party rejected the match.
    Rejected,
    /// The server let the match lapse.
    Expired,
    /// The donor side was cancelled server-side.
    CancelledByDonor,
    /// The recipient side was cancelled server-side.
    CancelledByRecipient,
}

impl MatchStatus {
    /// Check if no further client-initiated transition is legal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::Rejected
                | Self::Expired
                | Self::CancelledByDonor
                | Self::CancelledByRecipient
        )
    }

    /// Check if the match is still open for client actions.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Check if at least one party has confirmed and the match is still open.
    pub fn has_confirmation(&self) -> bool {
        matches!(
            self,
            Self::DonorConfirmed | Self::RecipientConfirmed | Self::Confirmed
        )
    }

    /// Status after exactly `party` (and not the other side) has confirmed.
    pub fn confirmed_by(party: Party) -> Self {
        match party {
            Party::Donor => Self::DonorConfirmed,
            Party::Recipient => Self::RecipientConfirmed,
        }
    }

    /// Status after `party`'s side was cancelled server-side.
    pub fn cancelled_by(party: Party) -> Self {
        match party {
            Party::Donor => Self::CancelledByDonor,
            Party::Recipient => Self::CancelledByRecipient,
        }
    }

    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Awaiting confirmation",
            Self::DonorConfirmed => "Donor confirmed",
            Self::RecipientConfirmed => "Recipient confirmed",
            Self::Confirmed => "Confirmed by both",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
            Self::Expired => "Expired",
            Self::CancelledByDonor => "Cancelled by donor",
            Self::CancelledByRecipient => "Cancelled by recipient",
        }
    }

    /// Return the status as the backend spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::DonorConfirmed => "DONOR_CONFIRMED",
            Self::RecipientConfirmed => "RECIPIENT_CONFIRMED",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
            Self::CancelledByDonor => "CANCELLED_BY_DONOR",
            Self::CancelledByRecipient => "CANCELLED_BY_RECIPIENT",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
