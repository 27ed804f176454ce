//! STOMP heartbeat negotiation and dead-connection detection.

use std::time::Duration;

use tokio::time::{self, Instant};

use donorlink_core::config::RealtimeConfig;

/// Heartbeat intervals the client asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// How often the client can send, in milliseconds (0 = never).
    pub outgoing_ms: u64,
    /// How often the client wants to receive, in milliseconds (0 = never).
    pub incoming_ms: u64,
    /// Missed-interval tolerance before the connection counts as dead.
    pub grace_multiplier: u32,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            outgoing_ms: config.heartbeat_outgoing_ms,
            incoming_ms: config.heartbeat_incoming_ms,
            grace_multiplier: config.heartbeat_grace_multiplier.max(1),
        }
    }
}

/// Intervals in effect after the CONNECTED frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// How often the client must send a heartbeat.
    pub send_every: Option<Duration>,
    /// How long without any inbound traffic means the connection is dead.
    pub timeout: Option<Duration>,
}

impl HeartbeatConfig {
    /// Negotiate against the server's `heart-beat` header.
    ///
    /// Each direction uses the larger of the two sides' values and is
    /// disabled when either side says 0. A missing or malformed header
    /// disables heartbeats in both directions.
    pub fn negotiate(&self, server_header: Option<&str>) -> Negotiated {
        let (server_send, server_want) = server_header.and_then(parse_header).unwrap_or((0, 0));

        let send_every = pick(self.outgoing_ms, server_want);
        let receive_every = pick(self.incoming_ms, server_send);
        Negotiated {
            send_every,
            timeout: receive_every.map(|d| d * self.grace_multiplier),
        }
    }
}

fn pick(ours: u64, theirs: u64) -> Option<Duration> {
    if ours == 0 || theirs == 0 {
        None
    } else {
        Some(Duration::from_millis(ours.max(theirs)))
    }
}

/// Parse a `heart-beat: cx,cy` header.
pub fn parse_header(value: &str) -> Option<(u64, u64)> {
    let (a, b) = value.split_once(',')?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Tracks inbound traffic and reports when the connection went quiet.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    timeout: Option<Duration>,
    last_seen: Instant,
}

impl HeartbeatMonitor {
    /// Start monitoring now.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            last_seen: Instant::now(),
        }
    }

    /// Record inbound traffic (any frame or heartbeat).
    pub fn record(&mut self) {
        self.last_seen = Instant::now();
    }

    /// When the connection will be considered dead, if monitoring is on.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|t| self.last_seen + t)
    }

    /// Resolves once the deadline passes; never resolves when disabled.
    pub async fn expired(&self) {
        match self.deadline() {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
