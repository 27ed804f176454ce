//! Shared test helpers for integration tests.
//!
//! [`FakeBackend`] plays the server: it owns the authoritative match and
//! notification records and enforces the same protocol rules the client
//! does. [`PushScript`] plays the push endpoint.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use donorlink_auth::SessionStore;
use donorlink_core::config::{MatchingConfig, RealtimeConfig};
use donorlink_core::error::{AppError, ErrorCode};
use donorlink_core::types::id::{DonationId, MatchId, NotificationId, RequestId, UserId};
use donorlink_entity::matching::{CompletionDetails, MatchResult, MatchStatus, Party};
use donorlink_entity::notification::{NotificationKind, NotificationRecord};
use donorlink_entity::session::Session;
use donorlink_entity::user::UserRole;
use donorlink_realtime::{Connector, PushTransport};
use donorlink_service::matching::lifecycle;
use donorlink_service::{
    MatchAction, MatchFilter, MatchGateway, MatchService, NotificationGateway, ServerTransition,
};

/// The authoritative server state.
#[derive(Default)]
pub struct FakeBackend {
    matches: Mutex<HashMap<MatchId, MatchResult>>,
    can_complete: Mutex<HashMap<MatchId, bool>>,
    notifications: Mutex<Vec<NotificationRecord>>,
    /// Number of mutating match calls received.
    pub match_mutations: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store (or overwrite) a match.
    pub fn put_match(&self, m: MatchResult) {
        self.matches.lock().unwrap().insert(m.match_id, m);
    }

    pub fn get_match(&self, id: MatchId) -> MatchResult {
        self.matches.lock().unwrap()[&id].clone()
    }

    pub fn set_can_complete(&self, id: MatchId, allowed: bool) {
        self.can_complete.lock().unwrap().insert(id, allowed);
    }

    /// Apply a server-initiated transition, stamping `updated_at`.
    pub fn server_transition(&self, id: MatchId, transition: ServerTransition) {
        let now = Utc::now();
        let mut matches = self.matches.lock().unwrap();
        let current = matches[&id].clone();
        if let Some(mut next) = lifecycle::apply_server(&current, &transition, now) {
            next.updated_at = Some(now);
            matches.insert(id, next);
        }
    }

    pub fn push_notification(&self, record: NotificationRecord) {
        self.notifications.lock().unwrap().insert(0, record);
    }

    pub fn notifications(&self) -> Vec<NotificationRecord> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn mutations(&self) -> usize {
        self.match_mutations.load(Ordering::SeqCst)
    }

    fn act(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        action: MatchAction,
    ) -> Result<(), AppError> {
        self.match_mutations.fetch_add(1, Ordering::SeqCst);
        let mut matches = self.matches.lock().unwrap();
        let current = matches
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Match not found").with_code(ErrorCode::MatchNotFound))?;
        if current.user_id_of(party) != session.user_id {
            return Err(AppError::authorization("Not your match").with_code(ErrorCode::NotAParty));
        }
        let now = Utc::now();
        let mut next = lifecycle::apply(&current, party, &action, now)?;
        next.updated_at = Some(now);
        matches.insert(id, next);
        Ok(())
    }
}

#[async_trait]
impl MatchGateway for FakeBackend {
    async fn list_matches(
        &self,
        session: &Session,
        filter: MatchFilter,
    ) -> Result<Vec<MatchResult>, AppError> {
        let me = session.user_id;
        let matches = self.matches.lock().unwrap();
        Ok(matches
            .values()
            .filter(|m| m.donor_user_id == me || m.recipient_user_id == me)
            .filter(|m| match filter {
                MatchFilter::AsDonor => m.donor_user_id == me,
                MatchFilter::AsRecipient => m.recipient_user_id == me,
                MatchFilter::Active => m.status.is_active(),
                MatchFilter::Pending => m.status == MatchStatus::Pending,
                MatchFilter::Confirmed => m.status == MatchStatus::Confirmed,
            })
            .cloned()
            .collect())
    }

    async fn confirm(&self, session: &Session, party: Party, id: MatchId) -> Result<(), AppError> {
        self.act(session, party, id, MatchAction::Confirm)
    }

    async fn reject(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        reason: &str,
    ) -> Result<(), AppError> {
        let reason = reason.to_string();
        self.act(session, party, id, MatchAction::Reject { reason })
    }

    async fn withdraw(
        &self,
        session: &Session,
        party: Party,
        id: MatchId,
        reason: &str,
    ) -> Result<(), AppError> {
        let reason = reason.to_string();
        self.act(session, party, id, MatchAction::Withdraw { reason })
    }

    async fn confirm_completion(
        &self,
        session: &Session,
        id: MatchId,
        details: &CompletionDetails,
    ) -> Result<(), AppError> {
        let allowed = self.can_complete.lock().unwrap().get(&id).copied().unwrap_or(false);
        {
            let mut matches = self.matches.lock().unwrap();
            if let Some(m) = matches.get_mut(&id) {
                m.can_confirm_completion = Some(allowed);
            }
        }
        self.act(session, Party::Recipient, id, MatchAction::Complete(details.clone()))
    }

    async fn can_confirm_completion(
        &self,
        _session: &Session,
        id: MatchId,
    ) -> Result<bool, AppError> {
        if !self.matches.lock().unwrap().contains_key(&id) {
            return Err(AppError::not_found("Match not found").with_code(ErrorCode::MatchNotFound));
        }
        Ok(self.can_complete.lock().unwrap().get(&id).copied().unwrap_or(false))
    }
}

#[async_trait]
impl NotificationGateway for FakeBackend {
    async fn list_notifications(
        &self,
        session: &Session,
    ) -> Result<Vec<NotificationRecord>, AppError> {
        Ok(self
            .notifications()
            .into_iter()
            .filter(|n| n.user_id == session.user_id)
            .collect())
    }

    async fn list_unread(&self, session: &Session) -> Result<Vec<NotificationRecord>, AppError> {
        let all = self.list_notifications(session).await?;
        Ok(all.into_iter().filter(|n| n.is_unread()).collect())
    }

    async fn unread_count(&self, session: &Session) -> Result<u64, AppError> {
        Ok(self.list_unread(session).await?.len() as u64)
    }

    async fn mark_read(&self, _session: &Session, id: NotificationId) -> Result<(), AppError> {
        let mut all = self.notifications.lock().unwrap();
        let record = all.iter_mut().find(|n| n.id == id).ok_or_else(|| {
            AppError::not_found("Notification not found").with_code(ErrorCode::NotificationNotFound)
        })?;
        record.is_read = true;
        Ok(())
    }

    async fn mark_all_read(&self, session: &Session) -> Result<(), AppError> {
        let mut all = self.notifications.lock().unwrap();
        all.iter_mut()
            .filter(|n| n.user_id == session.user_id)
            .for_each(|n| n.is_read = true);
        Ok(())
    }

    async fn delete(&self, _session: &Session, id: NotificationId) -> Result<(), AppError> {
        let mut all = self.notifications.lock().unwrap();
        let before = all.len();
        all.retain(|n| n.id != id);
        if all.len() == before {
            return Err(AppError::not_found("Notification not found")
                .with_code(ErrorCode::NotificationNotFound));
        }
        Ok(())
    }
}

/// One logged-in participant.
pub struct Participant {
    pub sessions: SessionStore,
    pub service: MatchService,
    pub user_id: UserId,
}

impl Participant {
    pub fn new(backend: &Arc<FakeBackend>, user_id: UserId, roles: &[UserRole]) -> Self {
        let session = Session::new(user_id, roles.iter().copied(), "token").unwrap();
        let sessions = SessionStore::with_session(session);
        let service = MatchService::new(
            Arc::clone(backend) as Arc<dyn MatchGateway>,
            sessions.clone(),
            &MatchingConfig::default(),
        );
        Self {
            sessions,
            service,
            user_id,
        }
    }
}

/// A donor, a recipient, and one pending match between them.
pub struct MatchFixture {
    pub backend: Arc<FakeBackend>,
    pub donor: Participant,
    pub recipient: Participant,
    pub match_id: MatchId,
}

impl MatchFixture {
    pub fn new() -> Self {
        let backend = FakeBackend::new();
        let donor = Participant::new(&backend, UserId::new(), &[UserRole::Donor]);
        let recipient = Participant::new(&backend, UserId::new(), &[UserRole::Recipient]);
        let m = MatchResult::pending(
            MatchId::new(),
            DonationId::new(),
            RequestId::new(),
            donor.user_id,
            recipient.user_id,
        );
        let match_id = m.match_id;
        backend.put_match(m);
        Self {
            backend,
            donor,
            recipient,
            match_id,
        }
    }

    /// Rewrite the server record so both parties confirmed at the given times.
    pub fn confirmed_at(&self, donor_at: DateTime<Utc>, recipient_at: DateTime<Utc>) {
        let mut m = self.backend.get_match(self.match_id);
        m.set_confirmation(Party::Donor, Some(donor_at));
        m.set_confirmation(Party::Recipient, Some(recipient_at));
        m.first_confirmer = Some(Party::Donor);
        m.first_confirmed_at = Some(donor_at);
        m.status = MatchStatus::Confirmed;
        m.updated_at = Some(recipient_at);
        self.backend.put_match(m);
    }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

pub fn notification(user_id: UserId, kind: NotificationKind, is_read: bool) -> NotificationRecord {
    NotificationRecord {
        id: NotificationId::new(),
        user_id,
        kind,
        title: "Update".into(),
        message: "Something happened to one of your items".into(),
        is_read,
        created_at: Utc::now(),
        metadata: None,
    }
}

/// Frames one push connection will deliver, in order. `None` closes it.
pub type ConnectionScript = Vec<Option<String>>;

/// Scripted push endpoint: each `connect` consumes the next script.
#[derive(Default)]
pub struct PushScript {
    scripts: Mutex<VecDeque<ConnectionScript>>,
    pub connects: AtomicUsize,
}

impl PushScript {
    pub fn new(scripts: Vec<ConnectionScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn connected() -> Option<String> {
        Some("CONNECTED\nversion:1.2\nheart-beat:0,0\n\n\0".to_string())
    }

    pub fn message(record: &NotificationRecord) -> Option<String> {
        let mut body = serde_json::to_value(record).unwrap();
        // The push endpoint still uses the legacy field name.
        let read = body.as_object_mut().unwrap().remove("isRead").unwrap();
        body["read"] = read;
        Some(format!(
            "MESSAGE\ndestination:/user/{}/queue/notifications\nsubscription:sub-notifications\n\n{}\0",
            record.user_id, body
        ))
    }
}

struct ScriptedTransport {
    frames: VecDeque<Option<String>>,
}

#[async_trait]
impl PushTransport for ScriptedTransport {
    async fn send(&mut self, _text: String) -> Result<(), AppError> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, AppError>> {
        match self.frames.pop_front() {
            Some(Some(frame)) => Some(Ok(frame)),
            Some(None) => None,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl Connector for PushScript {
    async fn connect(&self, _session: &Session) -> Result<Box<dyn PushTransport>, AppError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let frames = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::network("push endpoint unreachable"))?;
        Ok(Box::new(ScriptedTransport {
            frames: frames.into(),
        }))
    }
}

/// Realtime settings with a short reconnect delay.
pub fn fast_realtime() -> RealtimeConfig {
    RealtimeConfig {
        reconnect_delay_ms: 50,
        ..RealtimeConfig::default()
    }
}
