//! Push channel configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Real-time (STOMP over WebSocket) notification channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// WebSocket endpoint (the SockJS server's raw `/websocket` transport).
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    /// Per-user destination template; `{user_id}` is substituted.
    #[serde(default = "default_destination")]
    pub destination: String,
    /// Interval at which the client sends heartbeats, in milliseconds.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_outgoing_ms: u64,
    /// Interval at which the client wants server heartbeats, in milliseconds.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_incoming_ms: u64,
    /// Missing-heartbeat tolerance as a multiple of the negotiated incoming interval.
    #[serde(default = "default_grace_multiplier")]
    pub heartbeat_grace_multiplier: u32,
    /// Fixed delay between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Capacity of the buffer between the socket loop and the store.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
    /// CONNECT header carrying the caller's user id.
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
}

impl RealtimeConfig {
    /// Destination for the given user.
    pub fn destination_for(&self, user_id: &str) -> String {
        self.destination.replace("{user_id}", user_id)
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            destination: default_destination(),
            heartbeat_outgoing_ms: default_heartbeat(),
            heartbeat_incoming_ms: default_heartbeat(),
            heartbeat_grace_multiplier: default_grace_multiplier(),
            reconnect_delay_ms: default_reconnect_delay(),
            event_buffer_size: default_event_buffer(),
            user_id_header: default_user_id_header(),
        }
    }
}

fn default_ws_url() -> String {
    "ws://localhost:8080/ws/websocket".to_string()
}

fn default_destination() -> String {
    "/user/{user_id}/queue/notifications".to_string()
}

fn default_heartbeat() -> u64 {
    4_000
}

fn default_grace_multiplier() -> u32 {
    2
}

fn default_reconnect_delay() -> u64 {
    5_000
}

fn default_event_buffer() -> usize {
    256
}

fn default_user_id_header() -> String {
    "X-User-Id".to_string()
}
