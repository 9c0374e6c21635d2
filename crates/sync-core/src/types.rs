//! Record, cursor and sync state types.
//!
//! These types are shared by sources, sinks and cursor stores. Records are
//! kept as opaque JSON objects: the engine never interprets them beyond what
//! a [`RecordMapper`](crate::RecordMapper) extracts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Opaque continuation token handed out by a paged source.
///
/// `None` in an `Option<Cursor>` means "start from the beginning" when passed
/// to a source, and "no further pages" when returned by one.
pub type Cursor = String;

/// Derived identity used to suppress duplicate writes.
pub type DedupKey = String;

/// Number of cursor characters shown in log output.
const CURSOR_PREVIEW_LEN: usize = 30;

/// Shorten a cursor for log output.
///
/// Continuation tokens from the scraper API are several hundred characters
/// long; logs only need enough to tell two tokens apart.
pub fn cursor_preview(cursor: &str) -> String {
    if cursor.chars().count() <= CURSOR_PREVIEW_LEN {
        cursor.to_string()
    } else {
        let head: String = cursor.chars().take(CURSOR_PREVIEW_LEN).collect();
        format!("{head}...")
    }
}

/// A raw record as returned by a remote API.
///
/// Immutable once fetched. Field access supports dotted paths so nested
/// objects can be read without unpacking them first:
///
/// ```rust
/// use sync_core::Record;
///
/// let record = Record::from_value(serde_json::json!({
///     "id": "3141",
///     "user": { "username": "alice" }
/// }))
/// .unwrap();
///
/// assert_eq!(record.get_str("user.username"), Some("alice"));
/// assert_eq!(record.get_str("user.full_name"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create a record from a JSON object map.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Create a record from a JSON value.
    ///
    /// Returns `None` if the value is not an object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Look up a value by field name or dotted path (`user.username`).
    ///
    /// A JSON `null` is reported as absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current)
        }
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    /// Read a value that the API sometimes encodes as a number and sometimes
    /// as a string (numeric ids), always returning its string form.
    pub fn get_id(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Borrow the underlying field map.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the record, returning the underlying field map.
    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// One page returned by a [`PagedSource`](crate::PagedSource).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in source order.
    pub records: Vec<Record>,
    /// Cursor for the following page, `None` when the collection is exhausted.
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(records: Vec<Record>, next_cursor: Option<Cursor>) -> Self {
        Self {
            records,
            next_cursor,
        }
    }

    /// A page with no successor.
    pub fn last(records: Vec<Record>) -> Self {
        Self::new(records, None)
    }
}

/// Global deduplication domain for one sync command.
///
/// Holds the keys that already exist in the destination (from a full scan
/// made by the caller) and the keys accepted so far in this process. One set
/// is shared across all entities a command processes, so a record reachable
/// from two entities is written once.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    existing: HashSet<DedupKey>,
    seen: HashSet<DedupKey>,
}

impl DedupSet {
    /// Create a set seeded with the keys already present in the destination.
    pub fn new(existing: HashSet<DedupKey>) -> Self {
        Self {
            existing,
            seen: HashSet::new(),
        }
    }

    /// Whether `key` exists in the destination or was accepted in this run.
    pub fn contains(&self, key: &str) -> bool {
        self.existing.contains(key) || self.seen.contains(key)
    }

    /// Record `key` as accepted in this run.
    ///
    /// Returns `false` if the key was already known.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        if self.existing.contains(&key) {
            return false;
        }
        self.seen.insert(key)
    }

    /// Keys accepted in this run.
    pub fn seen(&self) -> &HashSet<DedupKey> {
        &self.seen
    }

    pub fn existing_len(&self) -> usize {
        self.existing.len()
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Fold the keys accepted in this run into the existing set.
    ///
    /// Mirrors what a fresh full scan of the destination would return once
    /// every accepted record has been written.
    pub fn commit_seen(&mut self) {
        self.existing.extend(self.seen.drain());
    }
}

impl FromIterator<DedupKey> for DedupSet {
    fn from_iter<I: IntoIterator<Item = DedupKey>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Persisted per-entity sync state.
///
/// Created on the first run for an entity, updated after every page and
/// finalized once pagination is exhausted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Source entity this state belongs to (target account, location, ...)
    pub entity: String,
    /// Resume point, `None` before the first page or after completion
    pub cursor: Option<Cursor>,
    /// Number of records written for this entity across completed runs
    pub synced_count: u64,
    /// Set once pagination for this entity has been exhausted
    pub fully_synced: bool,
    /// Timestamp of the last mutation
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            cursor: None,
            synced_count: 0,
            fully_synced: false,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_dotted_path_access() {
        let record = Record::from_value(json!({
            "id": 42,
            "caption": { "text": "sunset" },
            "user": { "username": "bob", "is_private": false, "id": "17841" },
            "empty": null
        }))
        .unwrap();

        assert_eq!(record.get_str("caption.text"), Some("sunset"));
        assert_eq!(record.get_bool("user.is_private"), Some(false));
        assert_eq!(record.get_i64("id"), Some(42));
        assert_eq!(record.get_id("id").as_deref(), Some("42"));
        assert_eq!(record.get_id("user.id").as_deref(), Some("17841"));
        assert!(record.get("empty").is_none());
        assert!(record.get("caption.text.more").is_none());
        assert!(record.get("missing.path").is_none());
    }

    #[test]
    fn test_record_from_non_object() {
        assert!(Record::from_value(json!([1, 2, 3])).is_none());
        assert!(Record::from_value(json!("alice")).is_none());
    }

    #[test]
    fn test_dedup_set_tracks_existing_and_seen() {
        let mut dedup: DedupSet = ["alice".to_string()].into_iter().collect();

        assert!(dedup.contains("alice"));
        assert!(!dedup.insert("alice".to_string()));
        assert!(dedup.insert("bob".to_string()));
        assert!(!dedup.insert("bob".to_string()));
        assert!(dedup.contains("bob"));
        assert_eq!(dedup.existing_len(), 1);
        assert_eq!(dedup.seen_len(), 1);

        dedup.commit_seen();
        assert_eq!(dedup.existing_len(), 2);
        assert_eq!(dedup.seen_len(), 0);
        assert!(dedup.contains("bob"));
    }

    #[test]
    fn test_cursor_preview() {
        assert_eq!(cursor_preview("short"), "short");
        let long = "x".repeat(80);
        let preview = cursor_preview(&long);
        assert_eq!(preview, format!("{}...", "x".repeat(30)));
    }

    #[test]
    fn test_sync_state_serialization() {
        let mut state = SyncState::new("rec123");
        state.cursor = Some("tok1".to_string());
        let json = serde_json::to_string(&state).unwrap();
        let parsed: SyncState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
