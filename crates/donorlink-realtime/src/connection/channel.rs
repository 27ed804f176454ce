//! The per-session push subscription.
//!
//! One background task per active session: connect, STOMP handshake,
//! subscribe to the user's queue, then pump frames until the connection
//! drops, and reconnect after a fixed delay. Parsed notifications go out on
//! an mpsc channel; connection state is published through a `watch`.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use donorlink_core::config::RealtimeConfig;
use donorlink_core::error::AppError;
use donorlink_core::types::id::UserId;
use donorlink_entity::notification::NotificationRecord;
use donorlink_entity::session::Session;

use crate::message::builder;
use crate::message::frame::{self, Decoded};
use crate::message::types::{Inbound, error_frame_to_app_error};
use crate::message::validator;
use crate::metrics::{ChannelMetrics, MetricsSnapshot};

use super::heartbeat::{HeartbeatConfig, HeartbeatMonitor, Negotiated};
use super::state::ChannelState;
use super::transport::{Connector, PushTransport};

/// How long to wait for CONNECTED after sending CONNECT.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A parsed notification and the session whose subscription received it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub session: Arc<Session>,
    pub record: NotificationRecord,
}

/// State shared between the channel handle and its background task.
struct Inner {
    connector: Arc<dyn Connector>,
    config: RealtimeConfig,
    heartbeat: HeartbeatConfig,
    state: watch::Sender<ChannelState>,
    events: mpsc::Sender<Delivery>,
    metrics: ChannelMetrics,
}

impl Inner {
    /// Publish a state change unless this run has been cancelled.
    ///
    /// The check happens under the watch lock, so once `stop` has cancelled
    /// the token a late transition from the task can no longer overwrite
    /// its `Disconnected`.
    fn transition(&self, token: &CancellationToken, next: ChannelState) {
        let changed = self.state.send_if_modified(|state| {
            if token.is_cancelled() || *state == next {
                return false;
            }
            *state = next;
            true
        });
        if changed {
            info!(state = %next, "Push channel state changed");
        }
    }

    fn deliver(
        &self,
        token: &CancellationToken,
        session: &Arc<Session>,
        record: NotificationRecord,
    ) {
        if token.is_cancelled() {
            return;
        }
        let delivery = Delivery {
            session: Arc::clone(session),
            record,
        };
        match self.events.try_send(delivery) {
            Ok(()) => self.metrics.record_delivered(),
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                self.metrics.record_dropped();
                warn!(notification_id = %dropped.record.id, "Notification buffer full, dropping push");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Notification receiver dropped");
            }
        }
    }
}

struct ActiveRun {
    user_id: UserId,
    token: CancellationToken,
    task: JoinHandle<()>,
}

/// One long-lived push subscription, bound to a session by its owner.
pub struct NotificationChannel {
    inner: Arc<Inner>,
    active: Mutex<Option<ActiveRun>>,
}

impl NotificationChannel {
    /// Creates an idle channel and the receiver its notifications arrive on.
    pub fn new(
        connector: Arc<dyn Connector>,
        config: RealtimeConfig,
    ) -> (Self, mpsc::Receiver<Delivery>) {
        let (events, rx) = mpsc::channel(config.event_buffer_size.max(1));
        let (state, _) = watch::channel(ChannelState::Disconnected);
        let inner = Inner {
            connector,
            heartbeat: HeartbeatConfig::from(&config),
            config,
            state,
            events,
            metrics: ChannelMetrics::new(),
        };
        let channel = Self {
            inner: Arc::new(inner),
            active: Mutex::new(None),
        };
        (channel, rx)
    }

    /// Start the subscription for `session`.
    ///
    /// A no-op returning `false` while a subscription is already running.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, session: Arc<Session>) -> bool {
        let mut active = self.active();
        if let Some(run) = active.as_ref() {
            if !run.task.is_finished() {
                debug!(user_id = %run.user_id, "Push channel already active");
                return false;
            }
        }

        let token = CancellationToken::new();
        let user_id = session.user_id;
        let task = tokio::spawn(run(Arc::clone(&self.inner), session, token.clone()));
        *active = Some(ActiveRun {
            user_id,
            token,
            task,
        });
        info!(user_id = %user_id, "Push channel started");
        true
    }

    /// Tear the subscription down. Returns `false` if none was running.
    ///
    /// Synchronous: when this returns, the reconnect timer is gone, no
    /// further notifications are emitted, and the state reads
    /// `Disconnected`.
    pub fn stop(&self) -> bool {
        let Some(run) = self.active().take() else {
            return false;
        };
        run.token.cancel();
        run.task.abort();
        self.inner.state.send_replace(ChannelState::Disconnected);
        info!(user_id = %run.user_id, "Push channel stopped");
        true
    }

    /// Whether a subscription task is running.
    pub fn is_active(&self) -> bool {
        self.active()
            .as_ref()
            .map(|run| !run.task.is_finished())
            .unwrap_or(false)
    }

    /// Current connection state.
    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Counter snapshot.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Connect/reconnect loop for one session.
async fn run(inner: Arc<Inner>, session: Arc<Session>, token: CancellationToken) {
    let delay = inner.config.reconnect_delay();
    let mut attempt: u64 = 0;

    loop {
        if attempt > 0 {
            inner.metrics.record_reconnect();
        }
        inner.transition(&token, ChannelState::Connecting);

        let result = tokio::select! {
            _ = token.cancelled() => break,
            result = run_connection(&inner, &session, &token) => result,
        };
        inner.transition(&token, ChannelState::Disconnected);

        match result {
            Ok(()) => info!(user_id = %session.user_id, "Push connection closed by server"),
            Err(e) if e.is_transient() => {
                warn!(user_id = %session.user_id, error = %e, attempt, "Push connection lost");
            }
            Err(e) => {
                error!(user_id = %session.user_id, error = %e, "Push channel giving up");
                break;
            }
        }

        attempt += 1;
        tokio::select! {
            _ = token.cancelled() => break,
            _ = time::sleep(delay) => {}
        }
    }

    debug!(user_id = %session.user_id, "Push channel loop ended");
}

/// One connection: handshake, subscribe, pump until it ends.
///
/// `Ok(())` means the server closed the connection cleanly.
async fn run_connection(
    inner: &Inner,
    session: &Arc<Session>,
    token: &CancellationToken,
) -> Result<(), AppError> {
    let mut transport = inner.connector.connect(session).await?;

    let connect = builder::build_connect(&transport.host(), session, &inner.config);
    transport.send(connect.encode()).await?;

    let negotiated = time::timeout(HANDSHAKE_TIMEOUT, await_connected(transport.as_mut(), inner))
        .await
        .map_err(|_| AppError::network("Timed out waiting for STOMP CONNECTED"))??;

    let destination = inner.config.destination_for(&session.user_id.to_string());
    transport
        .send(builder::build_subscribe(&destination).encode())
        .await?;

    inner.metrics.record_connect();
    inner.transition(token, ChannelState::Connected);
    info!(
        user_id = %session.user_id,
        destination = %destination,
        send_every = ?negotiated.send_every,
        timeout = ?negotiated.timeout,
        "Subscribed to notifications"
    );

    pump(transport.as_mut(), inner, session, token, negotiated).await
}

async fn await_connected(
    transport: &mut dyn PushTransport,
    inner: &Inner,
) -> Result<Negotiated, AppError> {
    loop {
        let text = match transport.recv().await {
            Some(text) => text?,
            None => return Err(AppError::network("Connection closed during STOMP handshake")),
        };
        for decoded in frame::decode(&text) {
            match decoded.map(Inbound::from) {
                Ok(Inbound::Connected {
                    heart_beat,
                    version,
                }) => {
                    debug!(version = ?version, heart_beat = ?heart_beat, "STOMP CONNECTED");
                    return Ok(inner.heartbeat.negotiate(heart_beat.as_deref()));
                }
                Ok(Inbound::Error { message }) => return Err(error_frame_to_app_error(&message)),
                Ok(Inbound::Heartbeat) => {}
                Ok(other) => debug!(frame = ?other, "Ignoring frame before CONNECTED"),
                Err(e) => warn!(error = %e, "Malformed frame during handshake"),
            }
        }
    }
}

async fn pump(
    transport: &mut dyn PushTransport,
    inner: &Inner,
    session: &Arc<Session>,
    token: &CancellationToken,
    negotiated: Negotiated,
) -> Result<(), AppError> {
    let mut monitor = HeartbeatMonitor::new(negotiated.timeout);
    let mut ticker = negotiated.send_every.map(|every| {
        let mut interval = time::interval_at(time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        interval
    });

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                let _ = transport.close().await;
                return Ok(());
            }
            _ = next_tick(&mut ticker) => {
                trace!("Sending heartbeat");
                transport.send(builder::heartbeat()).await?;
            }
            _ = monitor.expired() => {
                inner.metrics.record_heartbeat_timeout();
                warn!(timeout = ?negotiated.timeout, "No heartbeat from server");
                let _ = transport.close().await;
                return Err(AppError::network("Heartbeat timeout"));
            }
            incoming = transport.recv() => match incoming {
                None => return Ok(()),
                Some(Err(e)) => return Err(e),
                Some(Ok(text)) => {
                    monitor.record();
                    handle_text(inner, session, token, &text)?;
                }
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<time::Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn handle_text(
    inner: &Inner,
    session: &Arc<Session>,
    token: &CancellationToken,
    text: &str,
) -> Result<(), AppError> {
    for decoded in frame::decode(text) {
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(e) => {
                inner.metrics.record_dropped();
                warn!(error = %e, "Dropping malformed frame");
                continue;
            }
        };
        if !matches!(decoded, Decoded::Heartbeat) {
            inner.metrics.record_frame();
        }
        match Inbound::from(decoded) {
            Inbound::Heartbeat => trace!("Heartbeat received"),
            Inbound::Message {
                destination, body, ..
            } => match validator::parse_notification(&body) {
                Ok(record) => {
                    debug!(
                        notification_id = %record.id,
                        kind = %record.kind,
                        destination = ?destination,
                        "Notification received"
                    );
                    inner.deliver(token, session, record);
                }
                Err(e) => {
                    inner.metrics.record_dropped();
                    warn!(error = %e, destination = ?destination, "Dropping malformed notification");
                }
            },
            Inbound::Error { message } => return Err(error_frame_to_app_error(&message)),
            Inbound::Receipt { receipt_id } => debug!(receipt_id = ?receipt_id, "Receipt"),
            other => debug!(frame = ?other, "Ignoring unexpected frame"),
        }
    }
    Ok(())
}
