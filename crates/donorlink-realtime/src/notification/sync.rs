//! Notification store + push channel + REST gateway, bound to a session.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use donorlink_auth::SessionStore;
use donorlink_core::config::RealtimeConfig;
use donorlink_core::error::{AppError, ErrorKind};
use donorlink_core::types::id::NotificationId;
use donorlink_entity::notification::NotificationRecord;
use donorlink_entity::session::Session;
use donorlink_service::NotificationGateway;

use crate::connection::channel::{Delivery, NotificationChannel};
use crate::connection::state::ChannelState;
use crate::connection::transport::Connector;
use crate::metrics::MetricsSnapshot;

use super::store::NotificationStore;

/// Capacity of the arrivals broadcast.
const ARRIVALS_CAPACITY: usize = 64;

/// State shared with the push pump task.
struct Shared {
    store: Mutex<NotificationStore>,
    session: Mutex<Option<Arc<Session>>>,
    unread: watch::Sender<u64>,
    arrivals: broadcast::Sender<NotificationRecord>,
}

impl Shared {
    fn store(&self) -> MutexGuard<'_, NotificationStore> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session(&self) -> MutexGuard<'_, Option<Arc<Session>>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_current(&self, session: &Arc<Session>) -> bool {
        self.session()
            .as_ref()
            .map(|active| Arc::ptr_eq(active, session))
            .unwrap_or(false)
    }

    fn publish_unread(&self, count: u64) {
        self.unread.send_if_modified(|current| {
            if *current == count {
                return false;
            }
            *current = count;
            true
        });
    }

    /// Apply a store mutation and publish the resulting unread count.
    fn update<R>(&self, f: impl FnOnce(&mut NotificationStore) -> R) -> R {
        let mut store = self.store();
        let result = f(&mut store);
        let count = store.unread_count();
        drop(store);
        self.publish_unread(count);
        result
    }

    /// Accept a push only from the subscription of the bound session.
    fn ingest(&self, delivery: Delivery) {
        let Delivery { session, record } = delivery;
        if !self.is_current(&session) || session.user_id != record.user_id {
            debug!(notification_id = %record.id, "Discarding push for inactive session");
            return;
        }
        if self.update(|store| store.ingest_push(record.clone())) {
            let _ = self.arrivals.send(record);
        } else {
            debug!(notification_id = %record.id, "Duplicate push ignored");
        }
    }
}

/// Keeps the local notification list in step with the server for one
/// session at a time.
///
/// Pushes are ingested as they arrive; REST snapshots fully replace local
/// state. Mutations are applied locally first, then sent to the server;
/// when the server call fails the store is re-fetched.
pub struct NotificationSync {
    shared: Arc<Shared>,
    channel: NotificationChannel,
    gateway: Arc<dyn NotificationGateway>,
    pump: JoinHandle<()>,
}

impl NotificationSync {
    /// Creates an idle sync. Must be called from within a Tokio runtime.
    pub fn new(
        connector: Arc<dyn Connector>,
        gateway: Arc<dyn NotificationGateway>,
        config: RealtimeConfig,
    ) -> Self {
        let (channel, events) = NotificationChannel::new(connector, config);
        let (unread, _) = watch::channel(0);
        let (arrivals, _) = broadcast::channel(ARRIVALS_CAPACITY);
        let shared = Arc::new(Shared {
            store: Mutex::new(NotificationStore::new()),
            session: Mutex::new(None),
            unread,
            arrivals,
        });
        let pump = tokio::spawn(pump(Arc::clone(&shared), events));
        Self {
            shared,
            channel,
            gateway,
            pump,
        }
    }

    /// Bind to `session`: open the push channel and load the initial list.
    ///
    /// Re-entrant for the same session. A different session replaces the
    /// current one.
    pub async fn start(&self, session: Arc<Session>) -> Result<(), AppError> {
        if self.shared.is_current(&session) {
            debug!(user_id = %session.user_id, "Notification sync already bound");
            return Ok(());
        }
        self.stop();

        *self.shared.session() = Some(Arc::clone(&session));
        self.channel.start(Arc::clone(&session));
        info!(user_id = %session.user_id, "Notification sync started");
        self.refresh().await
    }

    /// Unbind: close the channel and clear local state. Returns whether a
    /// session was bound.
    pub fn stop(&self) -> bool {
        let previous = self.shared.session().take();
        self.channel.stop();
        self.shared.update(NotificationStore::clear);
        if let Some(session) = &previous {
            info!(user_id = %session.user_id, "Notification sync stopped");
        }
        previous.is_some()
    }

    /// Replace local state with the server's list and unread count.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let session = self.require_session()?;
        let (records, count) = futures::try_join!(
            self.gateway.list_notifications(&session),
            self.gateway.unread_count(&session),
        )?;
        if !self.shared.is_current(&session) {
            debug!(user_id = %session.user_id, "Discarding refresh for ended session");
            return Ok(());
        }
        let total = records.len();
        self.shared
            .update(|store| store.replace_all(records, Some(count)));
        debug!(user_id = %session.user_id, total, unread = count, "Notifications refreshed");
        Ok(())
    }

    /// Mark one notification read.
    ///
    /// Already-read records are not sent to the server again.
    pub async fn mark_read(&self, id: NotificationId) -> Result<(), AppError> {
        let session = self.require_session()?;
        if self.shared.store().get(id).is_some_and(|r| r.is_read) {
            return Ok(());
        }
        self.shared.update(|store| store.mark_read(id));
        let result = self.gateway.mark_read(&session, id).await;
        self.reconcile(&session, result, "mark_read").await
    }

    /// Mark every notification read.
    pub async fn mark_all_read(&self) -> Result<(), AppError> {
        let session = self.require_session()?;
        let changed = self.shared.update(NotificationStore::mark_all_read);
        debug!(changed, "Marked all notifications read locally");
        let result = self.gateway.mark_all_read(&session).await;
        self.reconcile(&session, result, "mark_all_read").await
    }

    /// Delete one notification. Deleting one the server no longer has
    /// counts as success.
    pub async fn remove(&self, id: NotificationId) -> Result<(), AppError> {
        let session = self.require_session()?;
        self.shared.update(|store| store.remove(id));
        let result = match self.gateway.delete(&session, id).await {
            Err(e) if e.kind == ErrorKind::NotFound => Ok(()),
            other => other,
        };
        self.reconcile(&session, result, "remove").await
    }

    /// Snapshot of the local list, most recent first.
    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.shared.store().records().to_vec()
    }

    /// Local unread records.
    pub fn unread(&self) -> Vec<NotificationRecord> {
        self.shared
            .store()
            .records()
            .iter()
            .filter(|r| r.is_unread())
            .cloned()
            .collect()
    }

    pub fn unread_count(&self) -> u64 {
        self.shared.store().unread_count()
    }

    /// Subscribe to unread-count changes.
    pub fn subscribe_unread(&self) -> watch::Receiver<u64> {
        self.shared.unread.subscribe()
    }

    /// Subscribe to newly ingested pushes.
    pub fn subscribe_arrivals(&self) -> broadcast::Receiver<NotificationRecord> {
        self.shared.arrivals.subscribe()
    }

    pub fn session(&self) -> Option<Arc<Session>> {
        self.shared.session().clone()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn watch_channel_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.watch_state()
    }

    pub fn channel_metrics(&self) -> MetricsSnapshot {
        self.channel.metrics()
    }

    /// Follow login/logout on `sessions` until the store is dropped.
    ///
    /// A session change while the initial load is in flight abandons the
    /// load and is handled at once.
    pub fn bind(self: Arc<Self>, sessions: SessionStore) -> JoinHandle<()> {
        let mut changes = sessions.subscribe();
        drop(sessions);
        tokio::spawn(async move {
            loop {
                let current = changes.borrow_and_update().clone();
                match current {
                    Some(session) => {
                        tokio::select! {
                            result = self.start(session) => {
                                if let Err(e) = result {
                                    warn!(error = %e, "Initial notification load failed");
                                }
                            }
                            changed = changes.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                                debug!("Session changed during initial notification load");
                                continue;
                            }
                        }
                    }
                    None => {
                        self.stop();
                    }
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
            self.stop();
        })
    }

    fn require_session(&self) -> Result<Arc<Session>, AppError> {
        self.session().ok_or_else(AppError::session_required)
    }

    async fn reconcile(
        &self,
        session: &Arc<Session>,
        result: Result<(), AppError>,
        action: &'static str,
    ) -> Result<(), AppError> {
        let Err(e) = result else {
            return Ok(());
        };
        warn!(action, error = %e, "Notification update rejected, reloading");
        if self.shared.is_current(session) {
            if let Err(refresh_err) = self.refresh().await {
                warn!(error = %refresh_err, "Reload after failed update also failed");
            }
        }
        Err(e)
    }
}

impl Drop for NotificationSync {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump(shared: Arc<Shared>, mut events: mpsc::Receiver<Delivery>) {
    while let Some(delivery) = events.recv().await {
        shared.ingest(delivery);
    }
}
