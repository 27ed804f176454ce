//! Builders for the client frames the channel sends.

use donorlink_core::config::RealtimeConfig;
use donorlink_entity::session::Session;

use super::frame::{Command, Frame};

/// Subscription id used for the per-user notification queue.
pub const NOTIFICATION_SUBSCRIPTION_ID: &str = "sub-notifications";

/// Build the CONNECT frame.
///
/// `host` is the virtual host, usually the server's host name.
pub fn build_connect(host: &str, session: &Session, config: &RealtimeConfig) -> Frame {
    Frame::new(Command::Connect)
        .header("accept-version", "1.2")
        .header("host", host)
        .header(
            "heart-beat",
            format!(
                "{},{}",
                config.heartbeat_outgoing_ms, config.heartbeat_incoming_ms
            ),
        )
        .header("Authorization", session.credential.bearer())
        .header(config.user_id_header.as_str(), session.user_id.to_string())
}

/// Build the SUBSCRIBE frame for the user's notification queue.
pub fn build_subscribe(destination: &str) -> Frame {
    Frame::new(Command::Subscribe)
        .header("id", NOTIFICATION_SUBSCRIPTION_ID)
        .header("destination", destination)
        .header("ack", "auto")
}

/// Heartbeat frame text.
pub fn heartbeat() -> String {
    "\n".to_string()
}
