//! Unified application error types for DonorLink.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Domain refusals additionally carry an
//! [`ErrorCode`] so callers can explain *why* an action was refused rather
//! than showing a generic failure.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested match or notification was not found.
    NotFound,
    /// No usable session: credential or user id missing or rejected.
    Authentication,
    /// The caller is not a party to the match or lacks the required role.
    Authorization,
    /// Input was malformed (reason too short, rating out of range, ...).
    Validation,
    /// The protocol state does not allow the action right now.
    Conflict,
    /// Transport-level failure (disconnect, timeout, connection refused).
    Network,
    /// The backend reported it is temporarily unavailable.
    ServiceUnavailable,
    /// The backend failed in an unexpected way.
    ExternalService,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// A configuration error occurred.
    Configuration,
    /// An internal error occurred.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Network => write!(f, "NETWORK"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Machine-readable tag attached to domain refusals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No session is active.
    SessionMissing,
    /// The current user is neither the donor nor the recipient of the match.
    NotAParty,
    /// The user acts as donor without holding the donor role.
    NotRegisteredAsDonor,
    /// The user acts as recipient without holding the recipient role.
    NotRegisteredAsRecipient,
    /// Unknown match id.
    MatchNotFound,
    /// Unknown notification id.
    NotificationNotFound,
    /// The match has moved on server-side and can no longer be acted on.
    MatchNotActionable,
    /// The match is in a terminal status.
    TerminalState,
    /// The acting party has already confirmed.
    AlreadyConfirmed,
    /// The acting party has not confirmed, so there is nothing to withdraw.
    NotConfirmed,
    /// The two-hour grace window has closed.
    GracePeriodExpired,
    /// The server refused a re-confirmation after a withdrawal.
    ReconfirmationWindowClosed,
    /// The action is not legal from the current status.
    InvalidTransition,
    /// Completion has already been recorded.
    AlreadyCompleted,
    /// The server has not certified the match as ready for completion.
    CompletionNotEligible,
    /// Only the recipient may confirm completion.
    CompletionRecipientOnly,
    /// Reason shorter than the configured minimum.
    ReasonTooShort,
    /// Completion notes shorter than the configured minimum.
    NotesTooShort,
    /// Rating outside 1..=5.
    RatingOutOfRange,
    /// Completion submitted without a received date.
    ReceivedDateMissing,
}

impl ErrorCode {
    /// Return the wire/display form of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionMissing => "SESSION_MISSING",
            Self::NotAParty => "NOT_A_PARTY",
            Self::NotRegisteredAsDonor => "NOT_REGISTERED_AS_DONOR",
            Self::NotRegisteredAsRecipient => "NOT_REGISTERED_AS_RECIPIENT",
            Self::MatchNotFound => "MATCH_NOT_FOUND",
            Self::NotificationNotFound => "NOTIFICATION_NOT_FOUND",
            Self::MatchNotActionable => "MATCH_NOT_ACTIONABLE",
            Self::TerminalState => "TERMINAL_STATE",
            Self::AlreadyConfirmed => "ALREADY_CONFIRMED",
            Self::NotConfirmed => "NOT_CONFIRMED",
            Self::GracePeriodExpired => "GRACE_PERIOD_EXPIRED",
            Self::ReconfirmationWindowClosed => "RECONFIRMATION_WINDOW_CLOSED",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::AlreadyCompleted => "ALREADY_COMPLETED",
            Self::CompletionNotEligible => "COMPLETION_NOT_ELIGIBLE",
            Self::CompletionRecipientOnly => "COMPLETION_RECIPIENT_ONLY",
            Self::ReasonTooShort => "REASON_TOO_SHORT",
            Self::NotesTooShort => "NOTES_TOO_SHORT",
            Self::RatingOutOfRange => "RATING_OUT_OF_RANGE",
            Self::ReceivedDateMissing => "RECEIVED_DATE_MISSING",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unified application error used throughout DonorLink.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// Optional domain tag.
    pub code: Option<ErrorCode>,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Attach a domain tag.
    #[must_use]
    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an authentication error ("please log in again").
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a transient network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Create an external-service error.
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// The error raised whenever an operation needs a session and none exists.
    pub fn session_required() -> Self {
        Self::authentication("Please log in again").with_code(ErrorCode::SessionMissing)
    }

    /// Whether this error may be retried automatically.
    ///
    /// Only the push channel's reconnect loop acts on this; mutating
    /// actions are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::ServiceUnavailable)
    }

    /// Check whether the error carries the given tag.
    pub fn has_code(&self, code: ErrorCode) -> bool {
        self.code == Some(code)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            code: self.code,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
