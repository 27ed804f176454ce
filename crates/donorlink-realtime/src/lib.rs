//! # donorlink-realtime
//!
//! Push notifications for the DonorLink client. Provides:
//!
//! - A STOMP 1.2 frame codec for the server's raw WebSocket endpoint
//! - Heartbeat negotiation and dead-connection detection
//! - [`NotificationChannel`]: one reconnecting push subscription per session
//! - [`NotificationStore`]: the client's reconciled list and unread count
//! - [`NotificationSync`]: store + channel + REST gateway bound to the
//!   session lifecycle

pub mod connection;
pub mod message;
pub mod metrics;
pub mod notification;

pub use connection::channel::{Delivery, NotificationChannel};
pub use connection::state::ChannelState;
pub use connection::transport::{Connector, PushTransport, WsConnector};
pub use metrics::{ChannelMetrics, MetricsSnapshot};
pub use notification::store::NotificationStore;
pub use notification::sync::NotificationSync;
