//! Local cache of matches and its reconciliation with server snapshots.
//!
//! Server records always replace local ones wholesale. When both sides carry
//! `updatedAt`, an older incoming snapshot is ignored (last writer wins);
//! otherwise the incoming record wins. Tentative (optimistic) records are
//! tracked so they can be rolled back to the exact prior value.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use donorlink_core::types::id::MatchId;
use donorlink_entity::matching::MatchResult;

use super::lifecycle::{self, ServerTransition};

/// Outcome of merging a server record into the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    /// The match was not known locally.
    Inserted,
    /// The local record was replaced.
    Replaced,
    /// The incoming record was older than the local one.
    Stale,
}

/// Matches known to this client, keyed by id.
///
/// Records are never removed; a superseded match simply carries a terminal
/// status.
#[derive(Debug, Default)]
pub struct MatchBook {
    records: HashMap<MatchId, MatchResult>,
    /// Record as it was before an optimistic write, by match id.
    tentative: HashMap<MatchId, MatchResult>,
}

impl MatchBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of known matches.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the book holds no matches.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The current local record.
    pub fn get(&self, id: MatchId) -> Option<&MatchResult> {
        self.records.get(&id)
    }

    /// Whether an optimistic write is outstanding for `id`.
    pub fn is_tentative(&self, id: MatchId) -> bool {
        self.tentative.contains_key(&id)
    }

    /// All matches, most recently updated first.
    pub fn list(&self) -> Vec<MatchResult> {
        let mut all: Vec<MatchResult> = self.records.values().cloned().collect();
        all.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.match_id.as_uuid().cmp(b.match_id.as_uuid()))
        });
        all
    }

    /// Non-terminal matches, most recently updated first.
    pub fn active(&self) -> Vec<MatchResult> {
        self.list()
            .into_iter()
            .filter(|m| m.status.is_active())
            .collect()
    }

    /// Merge one server record.
    ///
    /// A server record supersedes any outstanding optimistic write for the
    /// same match.
    pub fn upsert(&mut self, incoming: MatchResult) -> Merge {
        let id = incoming.match_id;
        let merge = match self.records.get(&id) {
            None => Merge::Inserted,
            Some(local) if is_older(incoming.updated_at, local.updated_at) => {
                debug!(match_id = %id, "Ignoring stale match snapshot");
                return Merge::Stale;
            }
            Some(_) => Merge::Replaced,
        };
        self.tentative.remove(&id);
        self.records.insert(id, incoming);
        merge
    }

    /// Merge a batch of server records; returns how many changed the book.
    pub fn upsert_all(&mut self, incoming: impl IntoIterator<Item = MatchResult>) -> usize {
        incoming
            .into_iter()
            .map(|m| self.upsert(m))
            .filter(|merge| *merge != Merge::Stale)
            .count()
    }

    /// Install a tentative record, remembering the one it replaces.
    pub fn begin(&mut self, tentative: MatchResult) {
        let id = tentative.match_id;
        if let Some(prior) = self.records.insert(id, tentative) {
            self.tentative.entry(id).or_insert(prior);
        }
    }

    /// Finish an optimistic write. With a server record, that record
    /// replaces the tentative one in full; without, the tentative one stays.
    pub fn commit(&mut self, id: MatchId, server: Option<MatchResult>) {
        self.tentative.remove(&id);
        if let Some(server) = server {
            self.records.insert(id, server);
        }
    }

    /// Undo an optimistic write. Returns whether anything was restored.
    pub fn rollback(&mut self, id: MatchId) -> bool {
        match self.tentative.remove(&id) {
            Some(prior) => {
                warn!(match_id = %id, "Rolling back optimistic match update");
                self.records.insert(id, prior);
                true
            }
            None => false,
        }
    }

    /// Apply a server-initiated transition to a known match.
    ///
    /// Returns the updated record, or `None` if the match is unknown or
    /// already in the target status.
    pub fn apply_server(
        &mut self,
        id: MatchId,
        transition: &ServerTransition,
        at: DateTime<Utc>,
    ) -> Option<MatchResult> {
        let next = lifecycle::apply_server(self.records.get(&id)?, transition, at)?;
        self.tentative.remove(&id);
        self.records.insert(id, next.clone());
        Some(next)
    }

    /// Drop everything; used when the session ends.
    pub fn clear(&mut self) {
        self.records.clear();
        self.tentative.clear();
    }
}

fn is_older(incoming: Option<DateTime<Utc>>, local: Option<DateTime<Utc>>) -> bool {
    matches!((incoming, local), (Some(i), Some(l)) if i < l)
}
