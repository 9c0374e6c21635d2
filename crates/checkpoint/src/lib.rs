//! Resume cursor storage for social-sync
//!
//! Provides [`CursorStore`](sync_core::CursorStore) backends that keep the
//! per-entity pagination cursor outside the sync process, so a killed run
//! resumes mid-sequence instead of starting over.
//!
//! ## Storage Backends
//!
//! - `FilesystemStore` - One JSON `SyncState` file per entity
//! - `MemoryStore` - In-process map (dry runs, tests)
//! - `NullStore` - No persistence; every run starts from the first page
//!
//! The Airtable-backed store that keeps the cursor on the entity's own
//! record lives in the `airtable-client` crate.

mod config;
mod filesystem;
mod memory;


// Re-export config types
pub use config::CursorStorage;

// Re-export storage implementations
pub use filesystem::FilesystemStore;
pub use memory::{MemoryStore, NullStore};
