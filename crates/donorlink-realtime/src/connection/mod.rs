//! Push connection: transport, heartbeats, state, and the reconnecting channel.

pub mod channel;
pub mod heartbeat;
pub mod state;
pub mod transport;

pub use channel::{Delivery, NotificationChannel};
pub use heartbeat::{HeartbeatConfig, HeartbeatMonitor, Negotiated};
pub use state::ChannelState;
pub use transport::{Connector, PushTransport, WsConnector};
