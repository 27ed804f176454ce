//! In-process session holder with change notification.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use donorlink_core::error::AppError;
use donorlink_entity::session::Session;

/// Holds the active session and broadcasts login/logout.
///
/// Components bound to the session lifecycle (push channel, in-flight
/// actions) subscribe here instead of polling, so they observe a logout in
/// the same tick it happens.
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Option<Arc<Session>>>>,
}

impl SessionStore {
    /// Creates an empty (logged-out) store.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Creates a store that starts logged in.
    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.login(session);
        store
    }

    /// Installs a new session, replacing any existing one.
    pub fn login(&self, session: Session) -> Arc<Session> {
        let session = Arc::new(session);
        info!(user_id = %session.user_id, "Session established");
        self.tx.send_replace(Some(Arc::clone(&session)));
        session
    }

    /// Drops the active session. Returns whether one was active.
    pub fn logout(&self) -> bool {
        let previous = self.tx.send_replace(None);
        if let Some(session) = &previous {
            info!(user_id = %session.user_id, "Session ended");
        }
        previous.is_some()
    }

    /// The active session, if any.
    pub fn current(&self) -> Option<Arc<Session>> {
        self.tx.borrow().clone()
    }

    /// The active session, or an authentication error.
    pub fn require(&self) -> Result<Arc<Session>, AppError> {
        self.current().ok_or_else(AppError::session_required)
    }

    /// Whether `session` is still the active session (same login, not just same user).
    pub fn is_current(&self, session: &Arc<Session>) -> bool {
        self.tx
            .borrow()
            .as_ref()
            .map(|active| Arc::ptr_eq(active, session))
            .unwrap_or(false)
    }

    /// Subscribe to login/logout changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Session>>> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
