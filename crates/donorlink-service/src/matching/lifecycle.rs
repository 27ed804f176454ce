//! Pure state transitions of the match confirmation protocol.
//!
//! Every function takes the current record and returns the next one. Nothing
//! here touches the network or reads the clock: callers pass `now`, which is
//! what the grace window is measured against.
//!
//! ```text
//! PENDING ──confirm──▶ {DONOR,RECIPIENT}_CONFIRMED ──confirm──▶ CONFIRMED ──complete──▶ COMPLETED
//!    ▲                         │        ▲                            │
//!    └────────withdraw─────────┘        └──────────withdraw──────────┘
//!
//! any open status ──reject──▶ REJECTED     (server) ──▶ EXPIRED | CANCELLED_BY_*
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use donorlink_entity::matching::{CompletionDetails, MatchResult, MatchStatus, Party};

use super::refusal::Refusal;

/// The client-initiated actions, without their payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Confirm the match.
    Confirm,
    /// Reject the match.
    Reject,
    /// Withdraw an earlier confirmation.
    Withdraw,
    /// Confirm completion (recipient only).
    Complete,
}

impl ActionKind {
    /// Every action, in display order.
    pub const ALL: [ActionKind; 4] = [Self::Confirm, Self::Reject, Self::Withdraw, Self::Complete];

    /// Return the action name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirm => "confirm",
            Self::Reject => "reject",
            Self::Withdraw => "withdraw",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-initiated action with its payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchAction {
    /// Confirm the match.
    Confirm,
    /// Reject the match with a reason.
    Reject {
        /// Why the party rejects.
        reason: String,
    },
    /// Withdraw the acting party's confirmation with a reason.
    Withdraw {
        /// Why the party withdraws.
        reason: String,
    },
    /// Record completion.
    Complete(CompletionDetails),
}

impl MatchAction {
    /// The payload-free action kind.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Confirm => ActionKind::Confirm,
            Self::Reject { .. } => ActionKind::Reject,
            Self::Withdraw { .. } => ActionKind::Withdraw,
            Self::Complete(_) => ActionKind::Complete,
        }
    }
}

/// A transition only the server initiates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerTransition {
    /// The match lapsed.
    Expired {
        /// Server-supplied reason.
        reason: Option<String>,
    },
    /// One side's donation or request was cancelled.
    Cancelled {
        /// The side that was cancelled.
        by: Party,
        /// Server-supplied reason.
        reason: Option<String>,
    },
}

impl ServerTransition {
    /// The terminal status this transition leads to.
    pub fn target_status(&self) -> MatchStatus {
        match self {
            Self::Expired { .. } => MatchStatus::Expired,
            Self::Cancelled { by, .. } => MatchStatus::cancelled_by(*by),
        }
    }
}

/// Check whether `party` may perform `kind` on `m` at `now`.
///
/// Covers protocol state only. Input shape (reason length, rating, notes)
/// is the gate's concern, apart from the non-empty reason and the received
/// date that [`apply`] itself requires.
pub fn precheck(
    m: &MatchResult,
    party: Party,
    kind: ActionKind,
    now: DateTime<Utc>,
) -> Result<(), Refusal> {
    if kind == ActionKind::Complete {
        if party != Party::Recipient {
            return Err(Refusal::CompletionRecipientOnly);
        }
        if m.completed_at.is_some() || m.status == MatchStatus::Completed {
            return Err(Refusal::AlreadyCompleted);
        }
    }

    if m.status.is_terminal() {
        return Err(Refusal::Terminal(m.status));
    }

    match kind {
        ActionKind::Confirm => {
            if m.is_confirmed_by(party) {
                return Err(Refusal::AlreadyConfirmed);
            }
        }
        ActionKind::Reject => {
            if m.status == MatchStatus::Confirmed && !m.within_grace(party, now) {
                return Err(Refusal::GracePeriodExpired);
            }
        }
        ActionKind::Withdraw => {
            if !m.is_confirmed_by(party) {
                return Err(Refusal::NotConfirmed);
            }
            if !m.status.has_confirmation() {
                return Err(Refusal::InvalidTransition {
                    action: kind,
                    status: m.status,
                });
            }
            if !m.within_grace(party, now) {
                return Err(Refusal::GracePeriodExpired);
            }
        }
        ActionKind::Complete => {
            if m.status != MatchStatus::Confirmed {
                return Err(Refusal::InvalidTransition {
                    action: kind,
                    status: m.status,
                });
            }
            if m.can_confirm_completion != Some(true) {
                return Err(Refusal::CompletionNotEligible);
            }
        }
    }
    Ok(())
}

/// Apply `action` by `party` at `now`, returning the next record.
pub fn apply(
    m: &MatchResult,
    party: Party,
    action: &MatchAction,
    now: DateTime<Utc>,
) -> Result<MatchResult, Refusal> {
    match action {
        MatchAction::Confirm => confirm(m, party, now),
        MatchAction::Reject { reason } => reject(m, party, reason, now),
        MatchAction::Withdraw { reason } => withdraw(m, party, reason, now),
        MatchAction::Complete(details) => confirm_completion(m, party, details, now),
    }
}

/// `party` confirms.
pub fn confirm(m: &MatchResult, party: Party, now: DateTime<Utc>) -> Result<MatchResult, Refusal> {
    precheck(m, party, ActionKind::Confirm, now)?;

    let mut next = m.clone();
    next.set_confirmation(party, Some(now));
    if next.first_confirmer.is_none() {
        next.first_confirmer = Some(party);
        next.first_confirmed_at = Some(now);
    }
    next.status = if next.is_confirmed() {
        MatchStatus::Confirmed
    } else {
        MatchStatus::confirmed_by(party)
    };
    Ok(next)
}

/// `party` rejects the match.
pub fn reject(
    m: &MatchResult,
    party: Party,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<MatchResult, Refusal> {
    precheck(m, party, ActionKind::Reject, now)?;
    let reason = require_reason(reason)?;

    let mut next = m.clone();
    next.status = MatchStatus::Rejected;
    next.rejected_by = Some(party);
    next.rejected_at = Some(now);
    next.rejection_reason = Some(reason);
    Ok(next)
}

/// `party` withdraws its confirmation.
pub fn withdraw(
    m: &MatchResult,
    party: Party,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<MatchResult, Refusal> {
    precheck(m, party, ActionKind::Withdraw, now)?;
    let reason = require_reason(reason)?;

    let mut next = m.clone();
    next.set_confirmation(party, None);
    next.withdrawn_by = Some(party);
    next.withdrawn_at = Some(now);
    next.withdrawal_reason = Some(reason);

    let other = party.other();
    next.status = if next.is_confirmed_by(other) {
        MatchStatus::confirmed_by(other)
    } else {
        MatchStatus::Pending
    };
    Ok(next)
}

/// The recipient attests receipt.
pub fn confirm_completion(
    m: &MatchResult,
    party: Party,
    details: &CompletionDetails,
    now: DateTime<Utc>,
) -> Result<MatchResult, Refusal> {
    precheck(m, party, ActionKind::Complete, now)?;
    let received = details.received_date.ok_or(Refusal::ReceivedDateMissing)?;

    let mut next = m.clone();
    next.status = MatchStatus::Completed;
    next.completed_at = Some(now);
    next.received_date = Some(received);
    next.completion_notes = Some(details.notes.trim().to_string());
    next.rating = details.rating;
    next.hospital_name = details.hospital_name.clone();
    next.can_confirm_completion = Some(false);
    Ok(next)
}

/// Apply a server-initiated transition.
///
/// Returns `None` when the record already carries the target status, so a
/// re-delivered event is a no-op.
pub fn apply_server(
    m: &MatchResult,
    transition: &ServerTransition,
    at: DateTime<Utc>,
) -> Option<MatchResult> {
    let target = transition.target_status();
    if m.status == target {
        return None;
    }
    if m.status.is_terminal() {
        warn!(
            match_id = %m.match_id,
            from = %m.status,
            to = %target,
            "Server transition replaces a terminal status"
        );
    }

    let mut next = m.clone();
    next.status = target;
    match transition {
        ServerTransition::Expired { reason } => {
            next.expired_at = Some(at);
            next.expiry_reason = reason.clone();
        }
        ServerTransition::Cancelled { reason, .. } => {
            next.cancelled_at = Some(at);
            next.cancellation_reason = reason.clone();
        }
    }
    Some(next)
}

fn require_reason(reason: &str) -> Result<String, Refusal> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(Refusal::ReasonTooShort { min: 1 });
    }
    Ok(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use donorlink_core::types::id::{DonationId, MatchId, RequestId, UserId};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn pending() -> MatchResult {
        MatchResult::pending(
            MatchId::new(),
            DonationId::new(),
            RequestId::new(),
            UserId::new(),
            UserId::new(),
        )
    }

    fn confirmed_at(at: DateTime<Utc>) -> MatchResult {
        let m = confirm(&pending(), Party::Donor, at).unwrap();
        confirm(&m, Party::Recipient, at).unwrap()
    }

    fn assert_flag_invariant(m: &MatchResult) {
        assert_eq!(m.is_confirmed(), m.donor_confirmed && m.recipient_confirmed);
        assert_eq!(m.donor_confirmed, m.donor_confirmed_at.is_some());
        assert_eq!(m.recipient_confirmed, m.recipient_confirmed_at.is_some());
    }

    #[test]
    fn test_both_parties_confirm() {
        let m = confirm(&pending(), Party::Donor, t0()).unwrap();
        assert_eq!(m.status, MatchStatus::DonorConfirmed);
        assert_eq!(m.first_confirmer, Some(Party::Donor));
        assert_eq!(m.first_confirmed_at, Some(t0()));
        assert!(!m.is_confirmed());
        assert_flag_invariant(&m);

        let later = t0() + Duration::minutes(5);
        let m = confirm(&m, Party::Recipient, later).unwrap();
        assert_eq!(m.status, MatchStatus::Confirmed);
        assert!(m.is_confirmed());
        assert_eq!(m.first_confirmer, Some(Party::Donor));
        assert_eq!(m.recipient_confirmed_at, Some(later));
        assert_flag_invariant(&m);
    }

    #[test]
    fn test_confirm_twice_is_refused() {
        let m = confirm(&pending(), Party::Recipient, t0()).unwrap();
        assert_eq!(
            confirm(&m, Party::Recipient, t0()).unwrap_err(),
            Refusal::AlreadyConfirmed
        );
        let m = confirmed_at(t0());
        assert_eq!(confirm(&m, Party::Donor, t0()).unwrap_err(), Refusal::AlreadyConfirmed);
    }

    #[test]
    fn test_withdraw_from_confirmed_reverts_to_other_side() {
        let m = confirmed_at(t0());
        let m = withdraw(&m, Party::Donor, "plans changed", t0() + Duration::minutes(30)).unwrap();
        assert_eq!(m.status, MatchStatus::RecipientConfirmed);
        assert!(!m.is_confirmed());
        assert!(!m.donor_confirmed);
        assert!(m.donor_confirmed_at.is_none());
        assert_eq!(m.withdrawn_by, Some(Party::Donor));
        assert_eq!(m.first_confirmer, Some(Party::Donor));
        assert_flag_invariant(&m);
    }

    #[test]
    fn test_withdraw_sole_confirmation_returns_to_pending() {
        let m = confirm(&pending(), Party::Recipient, t0()).unwrap();
        let m = withdraw(&m, Party::Recipient, "found another donor", t0()).unwrap();
        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.first_confirmer, Some(Party::Recipient));
    }

    #[test]
    fn test_withdraw_then_confirm_restamps() {
        let m = confirm(&pending(), Party::Donor, t0()).unwrap();
        let m = withdraw(&m, Party::Donor, "oops", t0() + Duration::minutes(1)).unwrap();
        let again = t0() + Duration::minutes(2);
        let m = confirm(&m, Party::Donor, again).unwrap();
        assert!(m.donor_confirmed);
        assert_eq!(m.donor_confirmed_at, Some(again));
        assert!(m.donor_confirmed_at > Some(t0()));
        assert_eq!(m.first_confirmed_at, Some(t0()));
    }

    #[test]
    fn test_grace_boundary_on_confirmed_match() {
        let m = confirmed_at(t0());
        let inside = t0() + Duration::minutes(119);
        let outside = t0() + Duration::minutes(121);

        assert!(withdraw(&m, Party::Donor, "reason", inside).is_ok());
        assert!(reject(&m, Party::Donor, "reason", inside).is_ok());
        assert_eq!(
            withdraw(&m, Party::Donor, "reason", outside).unwrap_err(),
            Refusal::GracePeriodExpired
        );
        assert_eq!(
            reject(&m, Party::Donor, "reason", outside).unwrap_err(),
            Refusal::GracePeriodExpired
        );
    }

    #[test]
    fn test_grace_window_closes_at_exactly_two_hours() {
        let m = confirmed_at(t0());
        assert_eq!(
            withdraw(&m, Party::Recipient, "reason", t0() + Duration::minutes(120)).unwrap_err(),
            Refusal::GracePeriodExpired
        );
    }

    #[test]
    fn test_reject_before_full_confirmation_has_no_window() {
        let m = confirm(&pending(), Party::Donor, t0()).unwrap();
        let m = reject(&m, Party::Recipient, "not suitable", t0() + Duration::days(3)).unwrap();
        assert_eq!(m.status, MatchStatus::Rejected);
        assert_eq!(m.rejected_by, Some(Party::Recipient));
        assert_eq!(m.rejection_reason.as_deref(), Some("not suitable"));
    }

    #[test]
    fn test_reject_requires_reason() {
        assert_eq!(
            reject(&pending(), Party::Donor, "   ", t0()).unwrap_err(),
            Refusal::ReasonTooShort { min: 1 }
        );
    }

    #[test]
    fn test_withdraw_without_confirmation_is_refused() {
        assert_eq!(
            withdraw(&pending(), Party::Donor, "reason", t0()).unwrap_err(),
            Refusal::NotConfirmed
        );
    }

    #[test]
    fn test_terminal_status_blocks_everything() {
        let rejected = reject(&pending(), Party::Donor, "no", t0()).unwrap();
        for kind in ActionKind::ALL {
            let party = if kind == ActionKind::Complete {
                Party::Recipient
            } else {
                Party::Donor
            };
            assert!(precheck(&rejected, party, kind, t0()).is_err(), "{kind} allowed");
        }
    }

    fn completion() -> CompletionDetails {
        CompletionDetails::new(NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(), "Received safely")
            .with_rating(5)
    }

    #[test]
    fn test_completion_requires_server_certification() {
        let m = confirmed_at(t0());
        assert_eq!(
            confirm_completion(&m, Party::Recipient, &completion(), t0()).unwrap_err(),
            Refusal::CompletionNotEligible
        );

        let mut m = m;
        m.can_confirm_completion = Some(true);
        let done = confirm_completion(&m, Party::Recipient, &completion(), t0()).unwrap();
        assert_eq!(done.status, MatchStatus::Completed);
        assert_eq!(done.completed_at, Some(t0()));
        assert_eq!(done.rating, Some(5));

        assert_eq!(
            confirm_completion(&done, Party::Recipient, &completion(), t0()).unwrap_err(),
            Refusal::AlreadyCompleted
        );
    }

    #[test]
    fn test_donor_cannot_complete() {
        let mut m = confirmed_at(t0());
        m.can_confirm_completion = Some(true);
        assert_eq!(
            confirm_completion(&m, Party::Donor, &completion(), t0()).unwrap_err(),
            Refusal::CompletionRecipientOnly
        );
    }

    #[test]
    fn test_completion_requires_received_date() {
        let mut m = confirmed_at(t0());
        m.can_confirm_completion = Some(true);
        let mut details = completion();
        details.received_date = None;
        assert_eq!(
            confirm_completion(&m, Party::Recipient, &details, t0()).unwrap_err(),
            Refusal::ReceivedDateMissing
        );
    }

    #[test]
    fn test_server_transition_is_idempotent() {
        let m = confirm(&pending(), Party::Donor, t0()).unwrap();
        let expire = ServerTransition::Expired {
            reason: Some("No response".into()),
        };
        let expired = apply_server(&m, &expire, t0()).unwrap();
        assert_eq!(expired.status, MatchStatus::Expired);
        assert_eq!(expired.expired_at, Some(t0()));
        assert!(apply_server(&expired, &expire, t0() + Duration::minutes(1)).is_none());
    }

    #[test]
    fn test_cancellation_targets_side() {
        let cancel = ServerTransition::Cancelled {
            by: Party::Recipient,
            reason: None,
        };
        let m = apply_server(&pending(), &cancel, t0()).unwrap();
        assert_eq!(m.status, MatchStatus::CancelledByRecipient);
        assert_eq!(m.cancelled_at, Some(t0()));
    }
}
