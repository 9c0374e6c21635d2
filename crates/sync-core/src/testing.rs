//! Test doubles for the collaborator contracts.
//!
//! Used by this crate's tests and by downstream crates that exercise the
//! engine without network access.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::error::MappingError;
use crate::traits::{CursorStore, PagedSource, RecordMapper, Sink};
use crate::types::{Cursor, DedupKey, Page, Record};

/// Build a record `{ "username": <name> }`.
pub fn user(name: &str) -> Record {
    Record::from_value(json!({ "username": name })).unwrap_or_default()
}

/// Build records for a list of usernames.
pub fn users(names: &[&str]) -> Vec<Record> {
    names.iter().map(|n| user(n)).collect()
}

/// Source serving fixed pages keyed by the cursor that requests them.
///
/// The first page is keyed by `None`. Every fetch is logged so tests can
/// assert which pages were (re)requested.
#[derive(Default)]
pub struct ScriptedSource {
    pages: HashMap<Option<Cursor>, Page>,
    failing: HashMap<Option<Cursor>, String>,
    empty: Vec<Option<Cursor>>,
    fetches: Mutex<Vec<Option<Cursor>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for `cursor`, pointing at `next`.
    pub fn page(mut self, cursor: Option<&str>, records: Vec<Record>, next: Option<&str>) -> Self {
        self.pages.insert(
            cursor.map(str::to_string),
            Page::new(records, next.map(str::to_string)),
        );
        self
    }

    /// Fail every fetch for `cursor` with `message`.
    pub fn fail_at(mut self, cursor: Option<&str>, message: &str) -> Self {
        self.failing
            .insert(cursor.map(str::to_string), message.to_string());
        self
    }

    /// Answer fetches for `cursor` with "no data".
    pub fn empty_at(mut self, cursor: Option<&str>) -> Self {
        self.empty.push(cursor.map(str::to_string));
        self
    }

    /// Cursors requested so far, in order.
    pub fn fetches(&self) -> Vec<Option<Cursor>> {
        self.fetches.lock().map(|f| f.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PagedSource for ScriptedSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Option<Page>> {
        let key = cursor.cloned();
        if let Ok(mut fetches) = self.fetches.lock() {
            fetches.push(key.clone());
        }
        if let Some(message) = self.failing.get(&key) {
            anyhow::bail!("{message}");
        }
        if self.empty.contains(&key) {
            return Ok(None);
        }
        match self.pages.get(&key) {
            Some(page) => Ok(Some(page.clone())),
            None => anyhow::bail!("Unknown cursor: {key:?}"),
        }
    }
}

/// Sink that records every batch it receives.
pub struct RecordingSink {
    max_batch_size: usize,
    fail_on_call: Option<usize>,
    batches: Mutex<Vec<Vec<String>>>,
    calls: Mutex<usize>,
}

impl RecordingSink {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size,
            fail_on_call: None,
            batches: Mutex::new(Vec::new()),
            calls: Mutex::new(0),
        }
    }

    /// Reject the `n`-th write (1-based).
    pub fn failing_on_call(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Successfully written batches.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// All successfully written records, flattened in write order.
    pub fn written(&self) -> Vec<String> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl Sink<String> for RecordingSink {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn write_batch(&self, batch: &[String]) -> Result<()> {
        let call = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?;
            *calls += 1;
            *calls
        };
        if batch.len() > self.max_batch_size {
            anyhow::bail!(
                "Batch of {} exceeds maximum of {}",
                batch.len(),
                self.max_batch_size
            );
        }
        if self.fail_on_call == Some(call) {
            anyhow::bail!("422 Unprocessable Entity");
        }
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(batch.to_vec());
        }
        Ok(())
    }
}

/// Operations observed by a [`RecordingCursorStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorOp {
    Save(String, Option<Cursor>),
    Clear(String),
    MarkFullySynced(String, u64),
}

/// In-memory cursor store that logs every mutation.
#[derive(Default)]
pub struct RecordingCursorStore {
    cursors: Mutex<HashMap<String, Cursor>>,
    ops: Mutex<Vec<CursorOp>>,
    fail_saves: bool,
}

impl RecordingCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a saved cursor for `entity`.
    pub fn with_cursor(self, entity: &str, cursor: &str) -> Self {
        if let Ok(mut cursors) = self.cursors.lock() {
            cursors.insert(entity.to_string(), cursor.to_string());
        }
        self
    }

    /// Make every save fail.
    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    pub fn cursor(&self, entity: &str) -> Option<Cursor> {
        self.cursors
            .lock()
            .ok()
            .and_then(|c| c.get(entity).cloned())
    }

    pub fn ops(&self) -> Vec<CursorOp> {
        self.ops.lock().map(|o| o.clone()).unwrap_or_default()
    }

    fn log(&self, op: CursorOp) {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
    }
}

#[async_trait]
impl CursorStore for RecordingCursorStore {
    async fn load(&self, entity: &str) -> Result<Option<Cursor>> {
        Ok(self.cursor(entity))
    }

    async fn save(&self, entity: &str, cursor: Option<&Cursor>) -> Result<()> {
        if self.fail_saves {
            anyhow::bail!("cursor store unavailable");
        }
        self.log(CursorOp::Save(entity.to_string(), cursor.cloned()));
        let mut cursors = self
            .cursors
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?;
        match cursor {
            Some(c) => cursors.insert(entity.to_string(), c.clone()),
            None => cursors.remove(entity),
        };
        Ok(())
    }

    async fn clear(&self, entity: &str) -> Result<()> {
        self.log(CursorOp::Clear(entity.to_string()));
        if let Ok(mut cursors) = self.cursors.lock() {
            cursors.remove(entity);
        }
        Ok(())
    }

    async fn mark_fully_synced(&self, entity: &str, added: u64) -> Result<()> {
        self.log(CursorOp::MarkFullySynced(entity.to_string(), added));
        Ok(())
    }
}

/// Maps `{ "username": .. }` records to their username.
///
/// Records whose username is `"!invalid"` fail mapping, to exercise the
/// skip path.
#[derive(Debug, Clone, Default)]
pub struct UsernameMapper;

impl RecordMapper for UsernameMapper {
    type Output = String;

    fn key(&self, record: &Record) -> Result<DedupKey, MappingError> {
        record
            .get_str("username")
            .map(str::to_string)
            .ok_or_else(|| MappingError::MissingKey("username".to_string()))
    }

    fn map(&self, record: &Record) -> Result<String, MappingError> {
        match record.get_str("username") {
            Some("!invalid") => Err(MappingError::InvalidField {
                field: "username".to_string(),
                reason: "rejected by test mapper".to_string(),
            }),
            Some(name) => Ok(name.to_string()),
            None => Err(MappingError::MissingField("username".to_string())),
        }
    }
}
