//! Match entity model.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use donorlink_core::types::id::{DonationId, MatchId, RequestId, UserId};

use super::party::Party;
use super::status::MatchStatus;

/// Length of the window after a party's own confirmation during which that
/// party may still withdraw or reject.
pub const GRACE_PERIOD_MINUTES: i64 = 120;

/// The grace period as a [`Duration`].
pub fn grace_period() -> Duration {
    Duration::minutes(GRACE_PERIOD_MINUTES)
}

/// A candidate pairing between one donation and one receive-request.
///
/// Identity fields never change after the server creates the record. All
/// lifecycle fields are mutated only through the confirmation protocol or
/// replaced wholesale by a server snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Unique match identifier.
    pub match_id: MatchId,
    /// The donation side of the pairing.
    pub donation_id: DonationId,
    /// The receive-request side of the pairing.
    pub request_id: RequestId,
    /// User who offered the donation.
    pub donor_user_id: UserId,
    /// User who filed the request.
    pub recipient_user_id: UserId,
    /// Current protocol status.
    pub status: MatchStatus,

    // -- Confirmation --
    /// Whether the donor currently stands confirmed.
    #[serde(default)]
    pub donor_confirmed: bool,
    /// Whether the recipient currently stands confirmed.
    #[serde(default)]
    pub recipient_confirmed: bool,
    /// When the donor's current confirmation was made.
    #[serde(default, with = "crate::timestamp::optional")]
    pub donor_confirmed_at: Option<DateTime<Utc>>,
    /// When the recipient's current confirmation was made.
    #[serde(default, with = "crate::timestamp::optional")]
    pub recipient_confirmed_at: Option<DateTime<Utc>>,
    /// Who confirmed first, ever. Never cleared.
    #[serde(default)]
    pub first_confirmer: Option<Party>,
    /// When the first confirmation ever happened. Never cleared.
    #[serde(default, with = "crate::timestamp::optional")]
    pub first_confirmed_at: Option<DateTime<Utc>>,

    // -- Withdrawal --
    /// The party that last withdrew.
    #[serde(default)]
    pub withdrawn_by: Option<Party>,
    /// When the last withdrawal happened.
    #[serde(default, with = "crate::timestamp::optional")]
    pub withdrawn_at: Option<DateTime<Utc>>,
    /// Reason given for the last withdrawal.
    #[serde(default)]
    pub withdrawal_reason: Option<String>,

    // -- Rejection --
    /// The party that rejected.
    #[serde(default)]
    pub rejected_by: Option<Party>,
    /// When the rejection happened.
    #[serde(default, with = "crate::timestamp::optional")]
    pub rejected_at: Option<DateTime<Utc>>,
    /// Reason given for the rejection.
    #[serde(default)]
    pub rejection_reason: Option<String>,

    // -- Server-initiated exits --
    /// When the server expired the match.
    #[serde(default, with = "crate::timestamp::optional")]
    pub expired_at: Option<DateTime<Utc>>,
    /// Why the server expired the match.
    #[serde(default)]
    pub expiry_reason: Option<String>,
    /// When the server cancelled the match.
    #[serde(default, with = "crate::timestamp::optional")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the server cancelled the match.
    #[serde(default)]
    pub cancellation_reason: Option<String>,

    // -- Completion --
    /// When the recipient confirmed completion. Set exactly once.
    #[serde(default, with = "crate::timestamp::optional")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Recipient's completion notes.
    #[serde(default)]
    pub completion_notes: Option<String>,
    /// Date the donation was physically received.
    #[serde(default)]
    pub received_date: Option<NaiveDate>,
    /// Recipient's 1–5 rating.
    #[serde(default)]
    pub rating: Option<u8>,
    /// Hospital where the donation was received.
    #[serde(default)]
    pub hospital_name: Option<String>,

    // -- Server bookkeeping --
    /// Server-computed completion eligibility, when the server sent it.
    #[serde(default)]
    pub can_confirm_completion: Option<bool>,
    /// Server modification stamp, used for last-writer-wins merging.
    #[serde(default, with = "crate::timestamp::optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MatchResult {
    /// A fresh `PENDING` match between the given parties.
    pub fn pending(
        match_id: MatchId,
        donation_id: DonationId,
        request_id: RequestId,
        donor_user_id: UserId,
        recipient_user_id: UserId,
    ) -> Self {
        Self {
            match_id,
            donation_id,
            request_id,
            donor_user_id,
            recipient_user_id,
            status: MatchStatus::Pending,
            donor_confirmed: false,
            recipient_confirmed: false,
            donor_confirmed_at: None,
            recipient_confirmed_at: None,
            first_confirmer: None,
            first_confirmed_at: None,
            withdrawn_by: None,
            withdrawn_at: None,
            withdrawal_reason: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            expired_at: None,
            expiry_reason: None,
            cancelled_at: None,
            cancellation_reason: None,
            completed_at: None,
            completion_notes: None,
            received_date: None,
            rating: None,
            hospital_name: None,
            can_confirm_completion: None,
            updated_at: None,
        }
    }

    /// Both parties currently stand confirmed.
    pub fn is_confirmed(&self) -> bool {
        self.donor_confirmed && self.recipient_confirmed
    }

    /// Whether `party` currently stands confirmed.
    pub fn is_confirmed_by(&self, party: Party) -> bool {
        match party {
            Party::Donor => self.donor_confirmed,
            Party::Recipient => self.recipient_confirmed,
        }
    }

    /// When `party`'s current confirmation was made.
    pub fn confirmed_at(&self, party: Party) -> Option<DateTime<Utc>> {
        match party {
            Party::Donor => self.donor_confirmed_at,
            Party::Recipient => self.recipient_confirmed_at,
        }
    }

    /// User id on the given side.
    pub fn user_id_of(&self, party: Party) -> UserId {
        match party {
            Party::Donor => self.donor_user_id,
            Party::Recipient => self.recipient_user_id,
        }
    }

    /// End of `party`'s grace window, if `party` is confirmed.
    pub fn grace_deadline(&self, party: Party) -> Option<DateTime<Utc>> {
        self.confirmed_at(party).map(|at| at + grace_period())
    }

    /// Whether `party`'s grace window is open at `now`.
    ///
    /// The window is half-open: exactly two hours after confirmation it is
    /// already closed.
    pub fn within_grace(&self, party: Party, now: DateTime<Utc>) -> bool {
        self.grace_deadline(party)
            .map(|deadline| now < deadline)
            .unwrap_or(false)
    }

    /// Time left in `party`'s grace window; `None` when closed or unconfirmed.
    pub fn grace_remaining(&self, party: Party, now: DateTime<Utc>) -> Option<Duration> {
        self.grace_deadline(party)
            .map(|deadline| deadline - now)
            .filter(|left| *left > Duration::zero())
    }

    /// Parties whose confirmation is still outstanding on an open match.
    pub fn awaiting(&self) -> Vec<Party> {
        if self.status.is_terminal() {
            return Vec::new();
        }
        [Party::Donor, Party::Recipient]
            .into_iter()
            .filter(|p| !self.is_confirmed_by(*p))
            .collect()
    }

    /// Set or clear `party`'s confirmation flag and timestamp together.
    pub fn set_confirmation(&mut self, party: Party, at: Option<DateTime<Utc>>) {
        match party {
            Party::Donor => {
                self.donor_confirmed = at.is_some();
                self.donor_confirmed_at = at;
            }
            Party::Recipient => {
                self.recipient_confirmed = at.is_some();
                self.recipient_confirmed_at = at;
            }
        }
    }
}
