//! Typed reasons an action on a match is not permitted.

use thiserror::Error;

use donorlink_core::error::{AppError, ErrorCode, ErrorKind};
use donorlink_entity::matching::MatchStatus;

use super::lifecycle::ActionKind;

/// Why the lifecycle engine or the gate refused an action.
///
/// The `Display` text is meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Refusal {
    /// The current user is not a party to the match.
    #[error("You are not a party to this match")]
    NotAParty,
    /// Acting as donor without the donor role.
    #[error("Your account is not registered as a donor")]
    NotRegisteredAsDonor,
    /// Acting as recipient without the recipient role.
    #[error("Your account is not registered as a recipient")]
    NotRegisteredAsRecipient,
    /// The match has reached a terminal status.
    #[error("This match is already {}", .0.label().to_lowercase())]
    Terminal(MatchStatus),
    /// The acting party already stands confirmed.
    #[error("You have already confirmed this match")]
    AlreadyConfirmed,
    /// Withdrawal requested by a party that has not confirmed.
    #[error("You have not confirmed this match")]
    NotConfirmed,
    /// The two-hour window after the party's own confirmation has closed.
    #[error("The 2-hour grace period for changing your decision has passed")]
    GracePeriodExpired,
    /// The action is not legal from the current status.
    #[error("Cannot {action} a match that is {}", .status.label().to_lowercase())]
    InvalidTransition {
        /// The attempted action.
        action: ActionKind,
        /// The status it was attempted from.
        status: MatchStatus,
    },
    /// Completion was already recorded.
    #[error("Completion has already been confirmed")]
    AlreadyCompleted,
    /// The server has not certified the match as ready for completion.
    #[error("This match cannot be marked complete yet")]
    CompletionNotEligible,
    /// A donor attempted completion.
    #[error("Only the recipient can confirm completion")]
    CompletionRecipientOnly,
    /// The reason is shorter than required.
    #[error("Please give a reason of at least {min} characters")]
    ReasonTooShort {
        /// Required minimum, in characters.
        min: usize,
    },
    /// The completion notes are shorter than required.
    #[error("Please add notes of at least {min} characters")]
    NotesTooShort {
        /// Required minimum, in characters.
        min: usize,
    },
    /// Rating outside 1..=5.
    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),
    /// Completion submitted without a received date.
    #[error("Please enter the date the donation was received")]
    ReceivedDateMissing,
    /// Completion details failed field validation.
    #[error("Invalid completion details: {0}")]
    InvalidDetails(String),
}

impl Refusal {
    /// The machine-readable tag for this refusal.
    pub fn code(&self) -> Option<ErrorCode> {
        let code = match self {
            Self::NotAParty => ErrorCode::NotAParty,
            Self::NotRegisteredAsDonor => ErrorCode::NotRegisteredAsDonor,
            Self::NotRegisteredAsRecipient => ErrorCode::NotRegisteredAsRecipient,
            Self::Terminal(_) => ErrorCode::TerminalState,
            Self::AlreadyConfirmed => ErrorCode::AlreadyConfirmed,
            Self::NotConfirmed => ErrorCode::NotConfirmed,
            Self::GracePeriodExpired => ErrorCode::GracePeriodExpired,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::AlreadyCompleted => ErrorCode::AlreadyCompleted,
            Self::CompletionNotEligible => ErrorCode::CompletionNotEligible,
            Self::CompletionRecipientOnly => ErrorCode::CompletionRecipientOnly,
            Self::ReasonTooShort { .. } => ErrorCode::ReasonTooShort,
            Self::NotesTooShort { .. } => ErrorCode::NotesTooShort,
            Self::RatingOutOfRange(_) => ErrorCode::RatingOutOfRange,
            Self::ReceivedDateMissing => ErrorCode::ReceivedDateMissing,
            Self::InvalidDetails(_) => return None,
        };
        Some(code)
    }

    /// The error class this refusal maps to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAParty
            | Self::NotRegisteredAsDonor
            | Self::NotRegisteredAsRecipient
            | Self::CompletionRecipientOnly => ErrorKind::Authorization,
            Self::ReasonTooShort { .. }
            | Self::NotesTooShort { .. }
            | Self::RatingOutOfRange(_)
            | Self::ReceivedDateMissing
            | Self::InvalidDetails(_) => ErrorKind::Validation,
            Self::Terminal(_)
            | Self::AlreadyConfirmed
            | Self::NotConfirmed
            | Self::GracePeriodExpired
            | Self::InvalidTransition { .. }
            | Self::AlreadyCompleted
            | Self::CompletionNotEligible => ErrorKind::Conflict,
        }
    }
}

impl From<Refusal> for AppError {
    fn from(refusal: Refusal) -> Self {
        let err = AppError::new(refusal.kind(), refusal.to_string());
        match refusal.code() {
            Some(code) => err.with_code(code),
            None => err,
        }
    }
}
