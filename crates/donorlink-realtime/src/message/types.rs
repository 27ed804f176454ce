//! Server-to-client STOMP traffic, classified.

use donorlink_core::error::{AppError, ErrorKind};

use super::frame::{Command, Decoded, Frame};

/// What the server sent, as far as the channel cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Keep-alive.
    Heartbeat,
    /// Session accepted.
    Connected {
        /// The server's `heart-beat` header, if any.
        heart_beat: Option<String>,
        /// Negotiated protocol version.
        version: Option<String>,
    },
    /// A message on a subscribed destination.
    Message {
        /// Destination it was published to.
        destination: Option<String>,
        /// Subscription id it was routed through.
        subscription: Option<String>,
        /// Raw body.
        body: String,
    },
    /// Receipt for a client frame.
    Receipt {
        /// The `receipt-id` header.
        receipt_id: Option<String>,
    },
    /// Server error; the server closes the connection after sending it.
    Error {
        /// The `message` header or body.
        message: String,
    },
    /// A frame a client never expects to receive.
    Unexpected(Command),
}

impl From<Decoded> for Inbound {
    fn from(decoded: Decoded) -> Self {
        match decoded {
            Decoded::Heartbeat => Self::Heartbeat,
            Decoded::Frame(frame) => Self::from(frame),
        }
    }
}

impl From<Frame> for Inbound {
    fn from(frame: Frame) -> Self {
        let header = |name: &str| frame.get(name).map(str::to_string);
        match frame.command {
            Command::Connected => Self::Connected {
                heart_beat: header("heart-beat"),
                version: header("version"),
            },
            Command::Message => Self::Message {
                destination: header("destination"),
                subscription: header("subscription"),
                body: frame.body.clone(),
            },
            Command::Receipt => Self::Receipt {
                receipt_id: header("receipt-id"),
            },
            Command::Error => {
                let message = header("message")
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| frame.body.trim().to_string());
                Self::Error { message }
            }
            other => Self::Unexpected(other),
        }
    }
}

/// Classify a server ERROR frame.
///
/// Credential problems end the channel for good; anything else is treated
/// as a server-side hiccup worth reconnecting after.
pub fn error_frame_to_app_error(message: &str) -> AppError {
    let lower = message.to_lowercase();
    let kind = if ["unauthor", "authenticat", "forbidden", "access denied", "token"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        ErrorKind::Authentication
    } else {
        ErrorKind::ServiceUnavailable
    };
    AppError::new(kind, format!("Push server error: {message}"))
}
