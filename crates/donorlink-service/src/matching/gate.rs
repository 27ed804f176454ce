//! Authorization of match actions for the current session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use validator::Validate;

use donorlink_core::config::MatchingConfig;
use donorlink_entity::matching::{CompletionDetails, MatchResult, Party};
use donorlink_entity::session::Session;
use donorlink_entity::user::UserRole;

use super::lifecycle::{self, ActionKind, MatchAction};
use super::refusal::Refusal;
use super::role::derive_role;

/// Result of [`ConfirmationGate::authorize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorization {
    /// Whether the action may proceed.
    pub allowed: bool,
    /// User-facing explanation when it may not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The typed refusal, when refused.
    #[serde(skip)]
    pub refusal: Option<Refusal>,
}

impl Authorization {
    fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            refusal: None,
        }
    }

    fn refused(refusal: Refusal) -> Self {
        Self {
            allowed: false,
            reason: Some(refusal.to_string()),
            refusal: Some(refusal),
        }
    }
}

/// Decides which actions the session user may take on a match.
///
/// Checks run in order: party membership, role registration, protocol
/// state (via the lifecycle engine), then input shape.
#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    /// Minimum reject/withdraw reason length, in characters.
    min_reason_length: usize,
    /// Minimum completion notes length, in characters.
    min_notes_length: usize,
}

impl ConfirmationGate {
    /// Creates a gate with the configured input limits.
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            min_reason_length: config.min_reason_length,
            min_notes_length: config.min_notes_length,
        }
    }

    /// Whether `action` is currently permitted, with the reason if not.
    pub fn authorize(
        &self,
        m: &MatchResult,
        session: &Session,
        action: &MatchAction,
        now: DateTime<Utc>,
    ) -> Authorization {
        match self.check(m, session, action, now) {
            Ok(_) => Authorization::allowed(),
            Err(refusal) => Authorization::refused(refusal),
        }
    }

    /// Like [`authorize`](Self::authorize), returning the acting party on success.
    pub fn check(
        &self,
        m: &MatchResult,
        session: &Session,
        action: &MatchAction,
        now: DateTime<Utc>,
    ) -> Result<Party, Refusal> {
        let party = self.acting_party(m, session)?;
        lifecycle::precheck(m, party, action.kind(), now)?;
        self.check_input(action)?;
        Ok(party)
    }

    /// Actions the session user could take on `m` right now, ignoring input.
    pub fn permitted_actions(
        &self,
        m: &MatchResult,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Vec<ActionKind> {
        let Ok(party) = self.acting_party(m, session) else {
            return Vec::new();
        };
        ActionKind::ALL
            .into_iter()
            .filter(|kind| lifecycle::precheck(m, party, *kind, now).is_ok())
            .collect()
    }

    fn acting_party(&self, m: &MatchResult, session: &Session) -> Result<Party, Refusal> {
        let party = derive_role(m, session)
            .party()
            .ok_or(Refusal::NotAParty)?;
        let (required, refusal) = match party {
            Party::Donor => (UserRole::Donor, Refusal::NotRegisteredAsDonor),
            Party::Recipient => (UserRole::Recipient, Refusal::NotRegisteredAsRecipient),
        };
        if !session.has_role(required) {
            return Err(refusal);
        }
        Ok(party)
    }

    fn check_input(&self, action: &MatchAction) -> Result<(), Refusal> {
        match action {
            MatchAction::Confirm => Ok(()),
            MatchAction::Reject { reason } | MatchAction::Withdraw { reason } => {
                if char_len(reason) < self.min_reason_length.max(1) {
                    return Err(Refusal::ReasonTooShort {
                        min: self.min_reason_length.max(1),
                    });
                }
                Ok(())
            }
            MatchAction::Complete(details) => self.check_completion(details),
        }
    }

    fn check_completion(&self, details: &CompletionDetails) -> Result<(), Refusal> {
        if details.received_date.is_none() {
            return Err(Refusal::ReceivedDateMissing);
        }
        if char_len(&details.notes) < self.min_notes_length {
            return Err(Refusal::NotesTooShort {
                min: self.min_notes_length,
            });
        }
        details.validate().map_err(|e| {
            match details.rating {
                Some(rating) if e.field_errors().contains_key("rating") => {
                    Refusal::RatingOutOfRange(rating)
                }
                _ => Refusal::InvalidDetails(e.to_string()),
            }
        })
    }
}

fn char_len(text: &str) -> usize {
    text.trim().chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use donorlink_core::types::id::{DonationId, MatchId, RequestId, UserId};
    use donorlink_entity::matching::MatchStatus;

    struct Fixture {
        gate: ConfirmationGate,
        donor: Session,
        recipient: Session,
        m: MatchResult,
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let donor = Session::new(UserId::new(), [UserRole::Donor], "d").unwrap();
        let recipient = Session::new(UserId::new(), [UserRole::Recipient], "r").unwrap();
        let m = MatchResult::pending(
            MatchId::new(),
            DonationId::new(),
            RequestId::new(),
            donor.user_id,
            recipient.user_id,
        );
        Fixture {
            gate: ConfirmationGate::new(&MatchingConfig::default()),
            donor,
            recipient,
            m,
        }
    }

    fn withdraw(reason: &str) -> MatchAction {
        MatchAction::Withdraw {
            reason: reason.into(),
        }
    }

    #[test]
    fn test_outsider_is_refused() {
        let f = fixture();
        let outsider = Session::new(UserId::new(), [UserRole::Donor], "o").unwrap();
        let auth = f.gate.authorize(&f.m, &outsider, &MatchAction::Confirm, now());
        assert!(!auth.allowed);
        assert_eq!(auth.refusal, Some(Refusal::NotAParty));
        assert!(f.gate.permitted_actions(&f.m, &outsider, now()).is_empty());
    }

    #[test]
    fn test_role_registration_is_required() {
        let f = fixture();
        let unregistered = Session::new(f.donor.user_id, [UserRole::Recipient], "x").unwrap();
        assert_eq!(
            f.gate
                .check(&f.m, &unregistered, &MatchAction::Confirm, now())
                .unwrap_err(),
            Refusal::NotRegisteredAsDonor
        );
    }

    #[test]
    fn test_pending_match_permits_confirm_and_reject() {
        let f = fixture();
        assert_eq!(
            f.gate.permitted_actions(&f.m, &f.donor, now()),
            vec![ActionKind::Confirm, ActionKind::Reject]
        );
        assert!(f.gate.authorize(&f.m, &f.donor, &MatchAction::Confirm, now()).allowed);
    }

    #[test]
    fn test_reason_minimum_length() {
        let f = fixture();
        let m = lifecycle::confirm(&f.m, Party::Donor, now()).unwrap();
        let auth = f.gate.authorize(&m, &f.donor, &withdraw("too short"), now());
        assert_eq!(auth.refusal, Some(Refusal::ReasonTooShort { min: 10 }));
        assert!(auth.reason.unwrap().contains("10 characters"));
        assert!(f.gate.authorize(&m, &f.donor, &withdraw("schedule conflict"), now()).allowed);
    }

    #[test]
    fn test_confirmed_match_outside_grace_allows_nothing_but_completion() {
        let f = fixture();
        let m = lifecycle::confirm(&f.m, Party::Donor, now()).unwrap();
        let mut m = lifecycle::confirm(&m, Party::Recipient, now()).unwrap();
        m.can_confirm_completion = Some(true);
        let later = now() + Duration::hours(3);

        assert!(f.gate.permitted_actions(&m, &f.donor, later).is_empty());
        assert_eq!(
            f.gate.permitted_actions(&m, &f.recipient, later),
            vec![ActionKind::Complete]
        );
        assert_eq!(
            f.gate.permitted_actions(&m, &f.recipient, now() + Duration::minutes(10)),
            vec![ActionKind::Reject, ActionKind::Withdraw, ActionKind::Complete]
        );
    }

    #[test]
    fn test_completion_input_shape() {
        let f = fixture();
        let m = lifecycle::confirm(&f.m, Party::Donor, now()).unwrap();
        let mut m = lifecycle::confirm(&m, Party::Recipient, now()).unwrap();
        m.can_confirm_completion = Some(true);
        let date = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();

        let short = MatchAction::Complete(CompletionDetails::new(date, "ok"));
        assert_eq!(
            f.gate.check(&m, &f.recipient, &short, now()).unwrap_err(),
            Refusal::NotesTooShort { min: 10 }
        );

        let bad_rating =
            MatchAction::Complete(CompletionDetails::new(date, "Arrived on time").with_rating(9));
        assert_eq!(
            f.gate.check(&m, &f.recipient, &bad_rating, now()).unwrap_err(),
            Refusal::RatingOutOfRange(9)
        );

        let zero =
            MatchAction::Complete(CompletionDetails::new(date, "Arrived on time").with_rating(0));
        assert_eq!(
            f.gate.check(&m, &f.recipient, &zero, now()).unwrap_err(),
            Refusal::RatingOutOfRange(0)
        );

        let long_hospital = MatchAction::Complete(
            CompletionDetails::new(date, "Arrived on time").with_hospital("x".repeat(201)),
        );
        assert!(matches!(
            f.gate.check(&m, &f.recipient, &long_hospital, now()),
            Err(Refusal::InvalidDetails(_))
        ));

        let mut no_date = CompletionDetails::new(date, "Arrived on time");
        no_date.received_date = None;
        assert_eq!(
            f.gate
                .check(&m, &f.recipient, &MatchAction::Complete(no_date), now())
                .unwrap_err(),
            Refusal::ReceivedDateMissing
        );

        let good =
            MatchAction::Complete(CompletionDetails::new(date, "Arrived on time").with_rating(4));
        assert_eq!(f.gate.check(&m, &f.recipient, &good, now()), Ok(Party::Recipient));
    }

    #[test]
    fn test_terminal_match_reports_state() {
        let f = fixture();
        let mut m = f.m.clone();
        m.status = MatchStatus::Expired;
        let auth = f.gate.authorize(&m, &f.donor, &MatchAction::Confirm, now());
        assert_eq!(auth.refusal, Some(Refusal::Terminal(MatchStatus::Expired)));
    }
}
