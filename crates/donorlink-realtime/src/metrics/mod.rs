//! Push channel metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Channel-level counters.
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    /// Successful handshakes
    pub connects: AtomicU64,
    /// Connection attempts after the first
    pub reconnects: AtomicU64,
    /// Frames received (heartbeats excluded)
    pub frames_received: AtomicU64,
    /// Notifications handed to the store
    pub delivered: AtomicU64,
    /// Notifications dropped (malformed or buffer full)
    pub dropped: AtomicU64,
    /// Connections declared dead for missing heartbeats
    pub heartbeat_timeouts: AtomicU64,
}

impl ChannelMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed handshake
    pub fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reconnect attempt
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a received frame
    pub fn record_frame(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivered notification
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dropped notification
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a heartbeat timeout
    pub fn record_heartbeat_timeout(&self) {
        self.heartbeat_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            heartbeat_timeouts: self.heartbeat_timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Successful handshakes
    pub connects: u64,
    /// Connection attempts after the first
    pub reconnects: u64,
    /// Frames received
    pub frames_received: u64,
    /// Notifications handed to the store
    pub delivered: u64,
    /// Notifications dropped
    pub dropped: u64,
    /// Heartbeat timeouts
    pub heartbeat_timeouts: u64,
}
