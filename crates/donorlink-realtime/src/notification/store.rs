//! The local notification list.
//!
//! Pure and synchronous. Records are kept most-recent-first with a cached
//! unread count; every mutation keeps the two consistent.

use donorlink_entity::notification::NotificationRecord;
use donorlink_core::types::id::NotificationId;

/// Ordered notifications plus the unread badge count.
#[derive(Debug, Clone, Default)]
pub struct NotificationStore {
    records: Vec<NotificationRecord>,
    unread: u64,
}

impl NotificationStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, most recent first.
    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    /// Cached unread count.
    pub fn unread_count(&self) -> u64 {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: NotificationId) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: NotificationId) -> bool {
        self.get(id).is_some()
    }

    /// Add a pushed record at the front.
    ///
    /// Returns `false` and changes nothing when the id is already present.
    pub fn ingest_push(&mut self, record: NotificationRecord) -> bool {
        if self.contains(record.id) {
            return false;
        }
        if record.is_unread() {
            self.unread += 1;
        }
        self.records.insert(0, record);
        true
    }

    /// Replace everything with a REST snapshot.
    ///
    /// The server's unread count wins when given; otherwise it is recounted
    /// from the snapshot. Duplicate ids in the snapshot keep their first
    /// occurrence.
    pub fn replace_all(&mut self, mut records: Vec<NotificationRecord>, server_unread: Option<u64>) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut seen = std::collections::HashSet::new();
        records.retain(|r| seen.insert(r.id));
        self.unread = server_unread.unwrap_or_else(|| Self::count_unread(&records));
        self.records = records;
    }

    /// Mark one record read. Returns whether it was previously unread.
    pub fn mark_read(&mut self, id: NotificationId) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) if record.is_unread() => {
                record.is_read = true;
                self.unread = self.unread.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    /// Mark every record read. Returns how many changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for record in self.records.iter_mut().filter(|r| r.is_unread()) {
            record.is_read = true;
            changed += 1;
        }
        self.unread = 0;
        changed
    }

    /// Remove one record, returning it.
    pub fn remove(&mut self, id: NotificationId) -> Option<NotificationRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        let record = self.records.remove(index);
        if record.is_unread() {
            self.unread = self.unread.saturating_sub(1);
        }
        Some(record)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.records.clear();
        self.unread = 0;
    }

    fn count_unread(records: &[NotificationRecord]) -> u64 {
        records.iter().filter(|r| r.is_unread()).count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use donorlink_core::types::id::UserId;
    use donorlink_entity::notification::NotificationKind;

    fn record(minute: i64, is_read: bool) -> NotificationRecord {
        NotificationRecord {
            id: NotificationId::new(),
            user_id: UserId::new(),
            kind: NotificationKind::NewDonation,
            title: "New donation".into(),
            message: "A donation near you".into(),
            is_read,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minute),
            metadata: None,
        }
    }

    #[test]
    fn test_ingest_prepends_and_counts_unread() {
        let mut store = NotificationStore::new();
        let first = record(0, false);
        let second = record(1, true);
        assert!(store.ingest_push(first.clone()));
        assert!(store.ingest_push(second.clone()));
        assert_eq!(store.records()[0].id, second.id);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_duplicate_push_is_ignored() {
        let mut store = NotificationStore::new();
        let first = record(0, false);
        store.ingest_push(first.clone());
        assert!(!store.ingest_push(first));
        assert_eq!(store.len(), 1);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut store = NotificationStore::new();
        let unread = record(0, false);
        let id = unread.id;
        store.ingest_push(unread);
        store.ingest_push(record(1, false));

        assert!(store.mark_read(id));
        assert_eq!(store.unread_count(), 1);
        assert!(!store.mark_read(id));
        assert_eq!(store.unread_count(), 1);
        assert!(!store.mark_read(NotificationId::new()));
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_all_read_zeroes_count() {
        let mut store = NotificationStore::new();
        store.ingest_push(record(0, false));
        store.ingest_push(record(1, true));
        store.ingest_push(record(2, false));
        assert_eq!(store.mark_all_read(), 2);
        assert_eq!(store.unread_count(), 0);
        assert!(store.records().iter().all(|r| r.is_read));
    }

    #[test]
    fn test_remove_decrements_only_unread() {
        let mut store = NotificationStore::new();
        let read = record(0, true);
        let unread = record(1, false);
        let (read_id, unread_id) = (read.id, unread.id);
        store.ingest_push(read);
        store.ingest_push(unread);

        assert!(store.remove(read_id).is_some());
        assert_eq!(store.unread_count(), 1);
        assert!(store.remove(unread_id).is_some());
        assert_eq!(store.unread_count(), 0);
        assert!(store.remove(unread_id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_replace_all_takes_server_count_and_orders() {
        let mut store = NotificationStore::new();
        store.ingest_push(record(0, false));

        let old = record(5, true);
        let new = record(10, false);
        store.replace_all(vec![old.clone(), new.clone(), old.clone()], Some(7));

        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[0].id, new.id);
        assert_eq!(store.unread_count(), 7);

        store.replace_all(vec![old, new], None);
        assert_eq!(store.unread_count(), 1);
    }
}
