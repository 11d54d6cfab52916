//! Notification list state.
//!
//! `NotificationFeed` is the local cache of the user's notifications,
//! newest first, with an unread counter that always equals the number of
//! records whose `is_read` flag is false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single notification as delivered by the backend or the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    #[serde(alias = "_id")]
    pub id: String,

    pub message: String,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub is_read: bool,
}

impl NotificationRecord {
    pub fn new(id: &str, message: &str) -> Self {
        Self {
            id: id.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            is_read: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationFeed {
    records: Vec<NotificationRecord>,
    unread: usize,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a feed from a fetched list.
    pub fn from_records(records: Vec<NotificationRecord>) -> Self {
        let mut feed = Self::new();
        feed.replace(records);
        feed
    }

    pub fn records(&self) -> &[NotificationRecord] {
        &self.records
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&NotificationRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Replaces the whole list, sorting newest first and recounting unread.
    pub fn replace(&mut self, mut records: Vec<NotificationRecord>) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.unread = records.iter().filter(|r| !r.is_read).count();
        self.records = records;
        self.debug_check();
    }

    /// Prepends a pushed record. Returns false for a duplicate id.
    pub fn push(&mut self, record: NotificationRecord) -> bool {
        if self.get(&record.id).is_some() {
            tracing::debug!(id = %record.id, "Ignoring duplicate notification");
            return false;
        }

        if !record.is_read {
            self.unread += 1;
        }
        self.records.insert(0, record);
        self.debug_check();
        true
    }

    /// Marks a record as read. Returns whether an unread record was flipped.
    pub fn mark_as_read(&mut self, id: &str) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        if record.is_read {
            return false;
        }

        record.is_read = true;
        self.unread = self.unread.saturating_sub(1);
        self.debug_check();
        true
    }

    /// Marks every record as read. Returns how many were flipped.
    pub fn mark_all_as_read(&mut self) -> usize {
        let flipped = self.unread;
        for record in &mut self.records {
            record.is_read = true;
        }
        self.unread = 0;
        flipped
    }

    /// Removes a record, adjusting the unread count if it was unread.
    pub fn delete(&mut self, id: &str) -> Option<NotificationRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        let record = self.records.remove(index);
        if !record.is_read {
            self.unread = self.unread.saturating_sub(1);
        }
        self.debug_check();
        Some(record)
    }

    /// Empties the list.
    pub fn clear(&mut self) {
        self.records.clear();
        self.unread = 0;
    }

    fn debug_check(&self) {
        debug_assert_eq!(
            self.unread,
            self.records.iter().filter(|r| !r.is_read).count(),
            "unread counter out of sync with records"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, minutes_ago: i64, is_read: bool) -> NotificationRecord {
        NotificationRecord {
            id: id.to_string(),
            message: format!("message {id}"),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            is_read,
        }
    }

    fn unread_in(feed: &NotificationFeed) -> usize {
        feed.records().iter().filter(|r| !r.is_read).count()
    }

    #[test]
    fn test_replace_sorts_newest_first() {
        let feed = NotificationFeed::from_records(vec![
            record("old", 60, true),
            record("new", 1, false),
            record("mid", 30, false),
        ]);

        let ids: Vec<_> = feed.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(feed.unread_count(), 2);
    }

    #[test]
    fn test_push_prepends_and_counts() {
        let mut feed = NotificationFeed::from_records(vec![record("a", 10, true)]);

        assert!(feed.push(NotificationRecord::new("n1", "New applicant")));
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.unread_count(), 1);
        assert_eq!(feed.records()[0].id, "n1");
    }

    #[test]
    fn test_push_read_record_keeps_count() {
        let mut feed = NotificationFeed::new();
        feed.push(record("r", 0, true));
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn test_push_duplicate_ignored() {
        let mut feed = NotificationFeed::new();
        assert!(feed.push(NotificationRecord::new("n1", "x")));
        assert!(!feed.push(NotificationRecord::new("n1", "x again")));
        assert_eq!(feed.len(), 1);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn test_mark_as_read() {
        let mut feed = NotificationFeed::new();
        feed.push(NotificationRecord::new("n1", "x"));

        assert!(feed.mark_as_read("n1"));
        assert!(feed.get("n1").unwrap().is_read);
        assert_eq!(feed.unread_count(), 0);

        // Second acknowledgement and unknown ids change nothing
        assert!(!feed.mark_as_read("n1"));
        assert!(!feed.mark_as_read("missing"));
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn test_mark_all_as_read() {
        let mut feed = NotificationFeed::from_records(vec![
            record("a", 1, false),
            record("b", 2, false),
            record("c", 3, true),
        ]);

        assert_eq!(feed.mark_all_as_read(), 2);
        assert_eq!(feed.unread_count(), 0);
        assert_eq!(unread_in(&feed), 0);
    }

    #[test]
    fn test_delete_unread_and_read() {
        let mut feed =
            NotificationFeed::from_records(vec![record("a", 1, false), record("b", 2, true)]);

        assert!(feed.delete("b").is_some());
        assert_eq!(feed.unread_count(), 1);

        assert!(feed.delete("a").is_some());
        assert_eq!(feed.unread_count(), 0);

        assert!(feed.delete("a").is_none());
    }

    #[test]
    fn test_clear() {
        let mut feed = NotificationFeed::from_records(vec![record("a", 1, false)]);
        feed.clear();
        assert!(feed.is_empty());
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn test_unread_invariant_across_mixed_operations() {
        let mut feed = NotificationFeed::from_records(vec![
            record("a", 5, false),
            record("b", 4, true),
            record("c", 3, false),
        ]);

        feed.push(NotificationRecord::new("d", "x"));
        assert_eq!(feed.unread_count(), unread_in(&feed));
        feed.mark_as_read("a");
        assert_eq!(feed.unread_count(), unread_in(&feed));
        feed.delete("c");
        assert_eq!(feed.unread_count(), unread_in(&feed));
        feed.push(record("e", 0, true));
        assert_eq!(feed.unread_count(), unread_in(&feed));
        feed.delete("b");
        assert_eq!(feed.unread_count(), unread_in(&feed));
        feed.clear();
        assert_eq!(feed.unread_count(), unread_in(&feed));
    }

    #[test]
    fn test_record_wire_format() {
        let json = r#"{"_id":"n1","message":"Application accepted","createdAt":"2025-02-01T09:30:00Z","isRead":true}"#;
        let record: NotificationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "n1");
        assert!(record.is_read);

        let out = serde_json::to_string(&record).unwrap();
        assert!(out.contains("\"isRead\":true"));
        assert!(out.contains("\"createdAt\""));
    }

    #[test]
    fn test_record_defaults() {
        let record: NotificationRecord =
            serde_json::from_str(r#"{"id":"n2","message":"hi"}"#).unwrap();
        assert!(!record.is_read);
    }
}
