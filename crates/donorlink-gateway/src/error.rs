//! HTTP failure mapping.

use donorlink_core::error::{AppError, ErrorCode, ErrorKind};

/// What a request was about, for tagging 404s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Match,
    Notification,
}

impl Resource {
    fn not_found_code(self) -> ErrorCode {
        match self {
            Self::Match => ErrorCode::MatchNotFound,
            Self::Notification => ErrorCode::NotificationNotFound,
        }
    }
}

/// Map a transport failure (no response received) onto an [`AppError`].
pub fn http_error(err: reqwest::Error) -> AppError {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
        ErrorKind::Network
    } else if err.is_decode() {
        ErrorKind::Serialization
    } else if err.is_builder() {
        ErrorKind::Configuration
    } else if let Some(status) = err.status() {
        return status_error(status.as_u16(), "", Resource::Match);
    } else {
        ErrorKind::ExternalService
    };
    AppError::with_source(kind, format!("HTTP request failed: {err}"), err)
}

/// Map a non-success response onto a tagged [`AppError`].
///
/// The body may be JSON with `code` and `message` fields or plain text.
/// When no recognizable `code` is present, role refusals and conflicts are
/// tagged from the message wording. A 400 or 422 that carries no conflict
/// tag is a validation failure.
pub fn status_error(status: u16, body: &str, resource: Resource) -> AppError {
    let (code, message) = parse_body(body);
    let message = message.unwrap_or_else(|| format!("Request failed with status {status}"));

    let err = match status {
        401 => AppError::authentication("Please log in again"),
        403 => {
            let code = code.or_else(|| role_code(&message));
            let err = AppError::authorization(message);
            match code {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        404 => {
            AppError::not_found(message).with_code(code.unwrap_or(resource.not_found_code()))
        }
        409 => {
            let err = AppError::conflict(message.clone());
            match code.or_else(|| conflict_code(&message)) {
                Some(code) => err.with_code(code),
                None => err,
            }
        }
        400 | 422 => match code.or_else(|| conflict_code(&message)) {
            Some(code) if is_input_code(code) => AppError::validation(message).with_code(code),
            Some(code) => AppError::conflict(message).with_code(code),
            None => AppError::validation(message),
        },
        503 => AppError::service_unavailable(message),
        _ => AppError::external(format!("Server error {status}: {message}")),
    };
    tracing::debug!(status, kind = %err.kind, code = ?err.code, "Mapped HTTP failure");
    err
}

fn parse_body(body: &str) -> (Option<ErrorCode>, Option<String>) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, None);
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) if value.is_object() => {
            let code = value
                .get("code")
                .and_then(|c| serde_json::from_value::<ErrorCode>(c.clone()).ok());
            let message = ["message", "error", "detail"]
                .iter()
                .find_map(|key| value.get(*key)?.as_str())
                .map(str::to_string);
            (code, message)
        }
        Ok(serde_json::Value::String(text)) => (None, Some(text)),
        _ => (None, Some(trimmed.to_string())),
    }
}

/// Tag a role refusal from the backend's message wording.
fn role_code(message: &str) -> Option<ErrorCode> {
    let lower = message.to_lowercase();
    if lower.contains("not registered") {
        if lower.contains("recipient") {
            Some(ErrorCode::NotRegisteredAsRecipient)
        } else if lower.contains("donor") {
            Some(ErrorCode::NotRegisteredAsDonor)
        } else {
            None
        }
    } else if lower.contains("not a party") || lower.contains("not part of this match") {
        Some(ErrorCode::NotAParty)
    } else if lower.contains("only the recipient") {
        Some(ErrorCode::CompletionRecipientOnly)
    } else {
        None
    }
}

/// Codes that describe malformed input rather than match state.
fn is_input_code(code: ErrorCode) -> bool {
    matches!(
        code,
        ErrorCode::ReasonTooShort
            | ErrorCode::NotesTooShort
            | ErrorCode::RatingOutOfRange
            | ErrorCode::ReceivedDateMissing
    )
}

/// Tag a conflict from the backend's message wording.
fn conflict_code(message: &str) -> Option<ErrorCode> {
    let lower = message.to_lowercase();
    if lower.contains("grace period") {
        Some(ErrorCode::GracePeriodExpired)
    } else if lower.contains("reconfirm") || lower.contains("re-confirm") {
        Some(ErrorCode::ReconfirmationWindowClosed)
    } else if lower.contains("already confirmed") {
        Some(ErrorCode::AlreadyConfirmed)
    } else if lower.contains("already completed") {
        Some(ErrorCode::AlreadyCompleted)
    } else if lower.contains("not confirmed") {
        Some(ErrorCode::NotConfirmed)
    } else {
        None
    }
}
