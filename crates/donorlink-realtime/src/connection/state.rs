//! Push channel connection state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the push channel is in its connect cycle.
///
/// `Disconnected → Connecting → Connected → (Disconnected | Connecting)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    /// No connection and none being attempted right now.
    #[default]
    Disconnected,
    /// Opening the socket or waiting for the STOMP handshake.
    Connecting,
    /// Subscribed and receiving.
    Connected,
}

impl ChannelState {
    /// Return the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
        }
    }

    /// Whether the channel is live.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
