//! In-process cursor stores.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use sync_core::{Cursor, CursorStore, SyncState};

/// Keeps cursor state in memory for the lifetime of the process.
///
/// Used for dry runs, where nothing may be written to the destination but
/// the run should still behave like a resumable one.
#[derive(Default)]
pub struct MemoryStore {
    states: Mutex<HashMap<String, SyncState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for `entity`, if any.
    pub fn state(&self, entity: &str) -> Option<SyncState> {
        self.states
            .lock()
            .ok()
            .and_then(|states| states.get(entity).cloned())
    }

    fn update<F>(&self, entity: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut SyncState),
    {
        let mut states = self
            .states
            .lock()
            .map_err(|_| anyhow!("Cursor state lock poisoned"))?;
        let state = states
            .entry(entity.to_string())
            .or_insert_with(|| SyncState::new(entity));
        mutate(state);
        state.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl CursorStore for MemoryStore {
    async fn load(&self, entity: &str) -> Result<Option<Cursor>> {
        Ok(self.state(entity).and_then(|state| state.cursor))
    }

    async fn save(&self, entity: &str, cursor: Option<&Cursor>) -> Result<()> {
        self.update(entity, |state| {
            state.cursor = cursor.cloned();
            state.fully_synced = false;
        })
    }

    async fn clear(&self, entity: &str) -> Result<()> {
        self.update(entity, |state| state.cursor = None)
    }

    async fn mark_fully_synced(&self, entity: &str, added: u64) -> Result<()> {
        self.update(entity, |state| {
            state.cursor = None;
            state.fully_synced = true;
            state.synced_count += added;
        })
    }
}

/// Cursor store that persists nothing.
///
/// Every run starts from the first page; used by commands whose source has
/// no meaningful resume point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStore;

#[async_trait]
impl CursorStore for NullStore {
    async fn load(&self, _entity: &str) -> Result<Option<Cursor>> {
        Ok(None)
    }

    async fn save(&self, _entity: &str, _cursor: Option<&Cursor>) -> Result<()> {
        Ok(())
    }

    async fn clear(&self, _entity: &str) -> Result<()> {
        Ok(())
    }
}
