//! Integration tests for the two-party match confirmation protocol.

mod helpers;

use chrono::NaiveDate;

use donorlink_core::error::{ErrorCode, ErrorKind};
use donorlink_entity::matching::{CompletionDetails, MatchStatus, Party};
use donorlink_service::{ActionKind, ActionOutcome, ServerTransition};

use helpers::{MatchFixture, minutes_ago};

fn details() -> CompletionDetails {
    CompletionDetails::new(
        NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        "Received at the ward, all in order",
    )
    .with_rating(5)
}

#[tokio::test]
async fn test_both_parties_confirm() {
    let fx = MatchFixture::new();
    fx.donor.service.load_all().await.unwrap();

    let outcome = fx.donor.service.confirm(fx.match_id).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(outcome.record().status, MatchStatus::DonorConfirmed);
    assert_eq!(outcome.record().first_confirmer, Some(Party::Donor));

    fx.recipient.service.load_all().await.unwrap();
    let outcome = fx.recipient.service.confirm(fx.match_id).await.unwrap();
    assert!(outcome.is_applied());
    assert_eq!(outcome.record().status, MatchStatus::Confirmed);
    assert!(outcome.record().is_confirmed());
    assert_eq!(fx.backend.get_match(fx.match_id).status, MatchStatus::Confirmed);
}

#[tokio::test]
async fn test_withdraw_inside_grace_period() {
    let fx = MatchFixture::new();
    fx.confirmed_at(minutes_ago(30), minutes_ago(20));
    fx.donor.service.load_all().await.unwrap();

    let permitted = fx.donor.service.permitted_actions(fx.match_id).unwrap();
    assert!(permitted.contains(&ActionKind::Withdraw));

    let outcome = fx
        .donor
        .service
        .withdraw(fx.match_id, "Plans changed, cannot travel")
        .await
        .unwrap();
    let record = outcome.record();
    assert_eq!(record.status, MatchStatus::RecipientConfirmed);
    assert!(!record.is_confirmed());
    assert!(!record.donor_confirmed);
    assert_eq!(record.withdrawn_by, Some(Party::Donor));
}

#[tokio::test]
async fn test_withdraw_after_grace_period_is_refused_locally() {
    let fx = MatchFixture::new();
    fx.confirmed_at(minutes_ago(121), minutes_ago(121));
    fx.donor.service.load_all().await.unwrap();

    let err = fx
        .donor
        .service
        .withdraw(fx.match_id, "Plans changed, cannot travel")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    assert!(err.has_code(ErrorCode::GracePeriodExpired));
    assert_eq!(fx.backend.mutations(), 0);
    assert_eq!(
        fx.donor.service.get(fx.match_id).unwrap().status,
        MatchStatus::Confirmed
    );
}

#[tokio::test]
async fn test_server_expiry_wins_over_stale_local_copy() {
    let fx = MatchFixture::new();
    fx.confirmed_at(minutes_ago(10), minutes_ago(5));
    fx.donor.service.load_all().await.unwrap();

    fx.backend.server_transition(
        fx.match_id,
        ServerTransition::Expired {
            reason: Some("Donation window closed".into()),
        },
    );

    let outcome = fx
        .donor
        .service
        .withdraw(fx.match_id, "Plans changed, cannot travel")
        .await
        .unwrap();
    match outcome {
        ActionOutcome::NoLongerActionable(m) => assert_eq!(m.status, MatchStatus::Expired),
        other => panic!("expected NoLongerActionable, got {other:?}"),
    }
    assert_eq!(
        fx.donor.service.get(fx.match_id).unwrap().status,
        MatchStatus::Expired
    );
    assert!(fx.donor.service.permitted_actions(fx.match_id).unwrap().is_empty());
}

#[tokio::test]
async fn test_completion_not_certified_makes_no_mutating_call() {
    let fx = MatchFixture::new();
    fx.confirmed_at(minutes_ago(300), minutes_ago(300));
    fx.backend.set_can_complete(fx.match_id, false);
    fx.recipient.service.load_all().await.unwrap();

    let err = fx
        .recipient
        .service
        .confirm_completion(fx.match_id, details())
        .await
        .unwrap_err();
    assert!(err.has_code(ErrorCode::CompletionNotEligible));
    assert_eq!(fx.backend.mutations(), 0);
}

#[tokio::test]
async fn test_recipient_completes_certified_match() {
    let fx = MatchFixture::new();
    fx.confirmed_at(minutes_ago(300), minutes_ago(300));
    fx.backend.set_can_complete(fx.match_id, true);
    fx.recipient.service.load_all().await.unwrap();

    let outcome = fx
        .recipient
        .service
        .confirm_completion(fx.match_id, details())
        .await
        .unwrap();
    assert!(outcome.is_applied());
    let server = fx.backend.get_match(fx.match_id);
    assert_eq!(server.status, MatchStatus::Completed);
    assert!(server.completed_at.is_some());
    assert_eq!(server.rating, Some(5));
}

#[tokio::test]
async fn test_donor_cannot_complete() {
    let fx = MatchFixture::new();
    fx.confirmed_at(minutes_ago(300), minutes_ago(300));
    fx.backend.set_can_complete(fx.match_id, true);
    fx.donor.service.load_all().await.unwrap();

    let err = fx
        .donor
        .service
        .confirm_completion(fx.match_id, details())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);
    assert_eq!(fx.backend.mutations(), 0);
}

#[tokio::test]
async fn test_short_reject_reason_is_refused() {
    let fx = MatchFixture::new();
    fx.donor.service.load_all().await.unwrap();

    let err = fx.donor.service.reject(fx.match_id, "no").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
    assert!(err.has_code(ErrorCode::ReasonTooShort));
    assert_eq!(fx.backend.mutations(), 0);
}

#[tokio::test]
async fn test_actions_require_session() {
    let fx = MatchFixture::new();
    fx.donor.service.load_all().await.unwrap();
    fx.donor.sessions.logout();

    let err = fx.donor.service.confirm(fx.match_id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);
    assert!(err.has_code(ErrorCode::SessionMissing));
}
