//! Match actions for the logged-in user.
//!
//! Every action follows the same path: gate check, tentative local apply,
//! remote call, then reconciliation with the server's record. Mutating
//! calls are never retried.

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use donorlink_auth::session::SessionStore;
use donorlink_core::config::MatchingConfig;
use donorlink_core::error::{AppError, ErrorCode, ErrorKind};
use donorlink_core::types::id::MatchId;
use donorlink_entity::matching::{CompletionDetails, MatchResult, MatchRole, MatchStatus, Party};
use donorlink_entity::session::Session;

use crate::gateway::{MatchFilter, MatchGateway};

use super::gate::{Authorization, ConfirmationGate};
use super::lifecycle::{self, ActionKind, MatchAction, ServerTransition};
use super::reconcile::MatchBook;
use super::role::derive_role;

/// What happened to an accepted action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The server accepted the action; carries the resulting record.
    Applied(MatchResult),
    /// The match moved on server-side. The local record was replaced with
    /// the server's and the action did not take effect.
    NoLongerActionable(MatchResult),
}

impl ActionOutcome {
    /// The record now held locally.
    pub fn record(&self) -> &MatchResult {
        match self {
            Self::Applied(m) | Self::NoLongerActionable(m) => m,
        }
    }

    /// Whether the action took effect.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// The match cache and the login it was filled under.
///
/// Access under any other login, or none, starts from an empty book.
struct ScopedBook {
    owner: Option<Arc<Session>>,
    book: MatchBook,
}

impl ScopedBook {
    fn rescope(&mut self, current: Option<Arc<Session>>) {
        let same = match (&self.owner, &current) {
            (Some(owner), Some(active)) => Arc::ptr_eq(owner, active),
            (None, None) => true,
            _ => false,
        };
        if same {
            return;
        }
        if !self.book.is_empty() {
            debug!(dropped = self.book.len(), "Session changed, dropping cached matches");
        }
        self.book.clear();
        self.owner = current;
    }
}

impl Deref for ScopedBook {
    type Target = MatchBook;

    fn deref(&self) -> &MatchBook {
        &self.book
    }
}

impl DerefMut for ScopedBook {
    fn deref_mut(&mut self) -> &mut MatchBook {
        &mut self.book
    }
}

/// Orchestrates match actions against the backend.
#[derive(Clone)]
pub struct MatchService {
    /// Remote match endpoints.
    gateway: Arc<dyn MatchGateway>,
    /// Login/logout lifecycle.
    sessions: SessionStore,
    /// Authorization rules.
    gate: ConfirmationGate,
    /// Local match cache, scoped to one login.
    book: Arc<Mutex<ScopedBook>>,
}

impl MatchService {
    /// Creates a new match service.
    pub fn new(
        gateway: Arc<dyn MatchGateway>,
        sessions: SessionStore,
        config: &MatchingConfig,
    ) -> Self {
        Self {
            gateway,
            sessions,
            gate: ConfirmationGate::new(config),
            book: Arc::new(Mutex::new(ScopedBook {
                owner: None,
                book: MatchBook::new(),
            })),
        }
    }

    /// The gate used for authorization.
    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    /// Fetch one listing and merge it into the local book.
    ///
    /// Returns the local view of the fetched matches after merging.
    pub async fn load(&self, filter: MatchFilter) -> Result<Vec<MatchResult>, AppError> {
        let session = self.sessions.require()?;
        let fetched = self.gateway.list_matches(&session, filter).await?;
        self.ensure_current(&session)?;

        let ids: Vec<MatchId> = fetched.iter().map(|m| m.match_id).collect();
        let mut book = self.book();
        let changed = book.upsert_all(fetched);
        debug!(filter = %filter, fetched = ids.len(), changed, "Merged match listing");
        Ok(ids.into_iter().filter_map(|id| book.get(id).cloned()).collect())
    }

    /// Fetch both sides' listings. Returns the number of known matches.
    pub async fn load_all(&self) -> Result<usize, AppError> {
        self.load(MatchFilter::AsDonor).await?;
        self.load(MatchFilter::AsRecipient).await?;
        Ok(self.book().len())
    }

    /// The local record for `id`.
    pub fn get(&self, id: MatchId) -> Option<MatchResult> {
        self.book().get(id).cloned()
    }

    /// Every known match, most recently updated first.
    pub fn matches(&self) -> Vec<MatchResult> {
        self.book().list()
    }

    /// Known non-terminal matches.
    pub fn active(&self) -> Vec<MatchResult> {
        self.book().active()
    }

    /// Actions the session user could take on `id` right now.
    pub fn permitted_actions(&self, id: MatchId) -> Result<Vec<ActionKind>, AppError> {
        let session = self.sessions.require()?;
        let m = self.lookup(id)?;
        Ok(self.gate.permitted_actions(&m, &session, Utc::now()))
    }

    /// Whether `action` on `id` is currently allowed.
    pub fn authorize(&self, id: MatchId, action: &MatchAction) -> Result<Authorization, AppError> {
        let session = self.sessions.require()?;
        let m = self.lookup(id)?;
        Ok(self.gate.authorize(&m, &session, action, Utc::now()))
    }

    /// Confirm the match.
    pub async fn confirm(&self, id: MatchId) -> Result<ActionOutcome, AppError> {
        self.perform(id, MatchAction::Confirm).await
    }

    /// Reject the match.
    pub async fn reject(
        &self,
        id: MatchId,
        reason: impl Into<String>,
    ) -> Result<ActionOutcome, AppError> {
        self.perform(id, MatchAction::Reject { reason: reason.into() })
            .await
    }

    /// Withdraw the session user's confirmation.
    pub async fn withdraw(
        &self,
        id: MatchId,
        reason: impl Into<String>,
    ) -> Result<ActionOutcome, AppError> {
        self.perform(id, MatchAction::Withdraw { reason: reason.into() })
            .await
    }

    /// Confirm completion as the recipient.
    pub async fn confirm_completion(
        &self,
        id: MatchId,
        details: CompletionDetails,
    ) -> Result<ActionOutcome, AppError> {
        self.perform(id, MatchAction::Complete(details)).await
    }

    /// Apply a server-initiated transition to a known match.
    pub fn apply_server_transition(
        &self,
        id: MatchId,
        transition: &ServerTransition,
        at: DateTime<Utc>,
    ) -> Option<MatchResult> {
        let updated = self.book().apply_server(id, transition, at);
        if let Some(m) = &updated {
            info!(match_id = %id, status = %m.status, "Applied server transition");
        }
        updated
    }

    /// Forget every cached match.
    pub fn clear(&self) {
        self.book().clear();
    }

    async fn perform(&self, id: MatchId, action: MatchAction) -> Result<ActionOutcome, AppError> {
        let session = self.sessions.require()?;
        let mut current = self.lookup(id)?;

        if action.kind() == ActionKind::Complete
            && derive_role(&current, &session) == MatchRole::Recipient
        {
            let eligible = self.gateway.can_confirm_completion(&session, id).await?;
            self.ensure_current(&session)?;
            current.can_confirm_completion = Some(eligible);
        }

        let now = Utc::now();
        let party = self.gate.check(&current, &session, &action, now)?;
        let tentative = lifecycle::apply(&current, party, &action, now)?;

        info!(
            match_id = %id,
            action = %action.kind(),
            party = %party,
            "Submitting match action"
        );

        let gateway = &self.gateway;
        let remote = async {
            match &action {
                MatchAction::Confirm => gateway.confirm(&session, party, id).await,
                MatchAction::Reject { reason } => {
                    gateway.reject(&session, party, id, reason.trim()).await
                }
                MatchAction::Withdraw { reason } => {
                    gateway.withdraw(&session, party, id, reason.trim()).await
                }
                MatchAction::Complete(details) => {
                    gateway.confirm_completion(&session, id, details).await
                }
            }
        };

        self.run_optimistic(&session, party, action.kind(), current, tentative, remote)
            .await
    }

    /// Apply `tentative` locally, run `remote`, then reconcile.
    ///
    /// - success: the server's record replaces the tentative one; if it
    ///   shows the action did not take effect the outcome is
    ///   `NoLongerActionable`
    /// - conflict or not-found: if the server's record moved away from
    ///   `prior` it replaces the local one (`NoLongerActionable`), else the
    ///   tentative record is rolled back and the tagged error surfaces
    /// - anything else: roll back and surface the error
    async fn run_optimistic<F>(
        &self,
        session: &Arc<Session>,
        party: Party,
        kind: ActionKind,
        prior: MatchResult,
        tentative: MatchResult,
        remote: F,
    ) -> Result<ActionOutcome, AppError>
    where
        F: Future<Output = Result<(), AppError>>,
    {
        let id = prior.match_id;
        self.book().begin(tentative.clone());

        let result = remote.await;
        if let Err(err) = self.ensure_current(session) {
            self.book().rollback(id);
            return Err(err);
        }

        match result {
            Ok(()) => match self.refetch(session, party, id).await {
                Ok(Some(server)) => {
                    self.book().commit(id, Some(server.clone()));
                    if took_effect(kind, party, &server) {
                        Ok(ActionOutcome::Applied(server))
                    } else {
                        info!(match_id = %id, status = %server.status, "Match no longer actionable");
                        Ok(ActionOutcome::NoLongerActionable(server))
                    }
                }
                Ok(None) => {
                    self.book().commit(id, None);
                    Ok(ActionOutcome::Applied(tentative))
                }
                Err(err) => {
                    self.book().rollback(id);
                    Err(err)
                }
            },
            Err(err) if matches!(err.kind, ErrorKind::Conflict | ErrorKind::NotFound) => {
                match self.refetch(session, party, id).await {
                    Ok(Some(server)) if !same_protocol_state(&server, &prior) => {
                        info!(
                            match_id = %id,
                            status = %server.status,
                            error = %err,
                            "Match moved on server, replacing local record"
                        );
                        self.book().commit(id, Some(server.clone()));
                        Ok(ActionOutcome::NoLongerActionable(server))
                    }
                    Ok(_) => {
                        self.book().rollback(id);
                        Err(err)
                    }
                    Err(stale) => {
                        self.book().rollback(id);
                        Err(stale)
                    }
                }
            }
            Err(err) => {
                warn!(match_id = %id, error = %err, "Match action failed");
                self.book().rollback(id);
                Err(err)
            }
        }
    }

    /// Re-read the server's record. Gateway failures yield `Ok(None)`; only
    /// a session change is an error.
    async fn refetch(
        &self,
        session: &Arc<Session>,
        party: Party,
        id: MatchId,
    ) -> Result<Option<MatchResult>, AppError> {
        let fetched = self.gateway.find_match(session, party, id).await;
        self.ensure_current(session)?;
        match fetched {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!(match_id = %id, error = %e, "Could not re-read match after action");
                Ok(None)
            }
        }
    }

    fn ensure_current(&self, session: &Arc<Session>) -> Result<(), AppError> {
        if self.sessions.is_current(session) {
            return Ok(());
        }
        warn!(user_id = %session.user_id, "Session changed during request, discarding result");
        Err(AppError::session_required())
    }

    fn lookup(&self, id: MatchId) -> Result<MatchResult, AppError> {
        self.book().get(id).cloned().ok_or_else(|| {
            AppError::not_found(format!("Match {id} not found")).with_code(ErrorCode::MatchNotFound)
        })
    }

    fn book(&self) -> MutexGuard<'_, ScopedBook> {
        let mut book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        book.rescope(self.sessions.current());
        book
    }
}

fn took_effect(kind: ActionKind, party: Party, server: &MatchResult) -> bool {
    match kind {
        ActionKind::Confirm => server.is_confirmed_by(party) && server.status.is_active(),
        ActionKind::Withdraw => !server.is_confirmed_by(party) && server.status.is_active(),
        ActionKind::Reject => server.status == MatchStatus::Rejected,
        ActionKind::Complete => server.status == MatchStatus::Completed,
    }
}

fn same_protocol_state(a: &MatchResult, b: &MatchResult) -> bool {
    a.status == b.status
        && a.donor_confirmed == b.donor_confirmed
        && a.recipient_confirmed == b.recipient_confirmed
}
