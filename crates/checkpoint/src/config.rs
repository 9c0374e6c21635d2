//! Cursor storage selection.

use std::path::PathBuf;
use sync_core::CursorStore;

use crate::{FilesystemStore, MemoryStore, NullStore};

/// Default directory for filesystem cursor state.
pub const DEFAULT_CURSOR_DIR: &str = ".social-sync-cursors";

/// Where resume cursors are kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CursorStorage {
    /// Cursors are not persisted.
    #[default]
    Disabled,

    /// Cursors live in process memory only.
    Memory,

    /// Cursors are written as JSON files under `dir`.
    Filesystem { dir: PathBuf },
}

impl CursorStorage {
    /// Filesystem storage, using the default directory when `dir` is `None`.
    pub fn filesystem(dir: Option<PathBuf>) -> Self {
        Self::Filesystem {
            dir: dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CURSOR_DIR)),
        }
    }

    /// Whether cursors survive a process restart.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Filesystem { .. })
    }

    /// Build the configured store.
    pub fn build(&self) -> Box<dyn CursorStore> {
        match self {
            Self::Disabled => Box::new(NullStore),
            Self::Memory => Box::new(MemoryStore::new()),
            Self::Filesystem { dir } => Box::new(FilesystemStore::new(dir.clone())),
        }
    }
}
