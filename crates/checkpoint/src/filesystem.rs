//! Filesystem-based cursor storage implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use sync_core::{Cursor, CursorStore, SyncState};

/// Filesystem implementation of the CursorStore trait.
///
/// Stores one pretty-printed [`SyncState`] per entity as
/// `cursor_{entity}.json` in a directory. Writes go to a temporary file that
/// is renamed over the previous state, so a crash mid-write leaves the last
/// good state in place.
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create a new FilesystemStore with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the directory path.
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path of the state file for `entity`.
    ///
    /// Bytes outside `[A-Za-z0-9-]` are written as `_` plus two hex digits,
    /// so arbitrary entity ids (usernames, numeric location ids, record ids)
    /// map to safe and distinct names.
    pub fn state_path(&self, entity: &str) -> PathBuf {
        let mut encoded = String::with_capacity(entity.len());
        for byte in entity.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                encoded.push(char::from(byte));
            } else {
                encoded.push_str(&format!("_{byte:02x}"));
            }
        }
        self.dir.join(format!("cursor_{encoded}.json"))
    }

    /// Read the persisted state for `entity`, if any.
    pub fn state(&self, entity: &str) -> Result<Option<SyncState>> {
        let path = self.state_path(entity);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cursor state {}", path.display()))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse cursor state {}", path.display()))?;
        Ok(Some(state))
    }

    fn update<F>(&self, entity: &str, mutate: F) -> Result<SyncState>
    where
        F: FnOnce(&mut SyncState),
    {
        let mut state = self
            .state(entity)?
            .unwrap_or_else(|| SyncState::new(entity));
        mutate(&mut state);
        state.updated_at = Utc::now();
        self.write_state(&state)?;
        Ok(state)
    }

    fn write_state(&self, state: &SyncState) -> Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create cursor directory {}", self.dir.display())
        })?;

        let path = self.state_path(&state.entity);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Failed to write cursor state {}", tmp.display()))?;
        replace(&tmp, &path)?;
        tracing::debug!("Stored cursor state to {}", path.display());
        Ok(())
    }
}

fn replace(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))
}

#[async_trait]
impl CursorStore for FilesystemStore {
    async fn load(&self, entity: &str) -> Result<Option<Cursor>> {
        Ok(self.state(entity)?.and_then(|state| state.cursor))
    }

    async fn save(&self, entity: &str, cursor: Option<&Cursor>) -> Result<()> {
        self.update(entity, |state| {
            state.cursor = cursor.cloned();
            state.fully_synced = false;
        })?;
        Ok(())
    }

    async fn clear(&self, entity: &str) -> Result<()> {
        if !self.state_path(entity).exists() {
            return Ok(());
        }
        self.update(entity, |state| state.cursor = None)?;
        Ok(())
    }

    async fn mark_fully_synced(&self, entity: &str, added: u64) -> Result<()> {
        let state = self.update(entity, |state| {
            state.cursor = None;
            state.fully_synced = true;
            state.synced_count += added;
        })?;
        tracing::info!(
            "Stored fully synced state for {} ({} records total)",
            entity,
            state.synced_count
        );
        Ok(())
    }
}
