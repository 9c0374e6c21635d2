//! Core of the social-sync framework.
//!
//! This crate provides the paginated-sync-with-deduplication engine shared by
//! every sync command, together with the collaborator contracts it drives:
//!
//! - [`PagedSource`] - one page of raw records per call, plus a continuation cursor
//! - [`Sink`] - batched writer against the destination store
//! - [`CursorStore`] - per-entity resume cursor persistence
//! - [`RecordMapper`] - dedup key extraction and destination schema mapping
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── checkpoint        (CursorStore backends: filesystem, memory, null)
//!    ├─── airtable-client   (Sink + CursorStore over the Airtable REST API)
//!    └─── instagram-source  (PagedSource adapters over the scraper API)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use sync_core::{DedupSet, EngineConfig, SyncEngine};
//!
//! let engine = SyncEngine::new(FollowerMapper::new(target_id), EngineConfig::with_batch_size(100));
//! let mut dedup = DedupSet::new(existing_usernames);
//! let result = engine
//!     .run(&target_id, &source, &mut dedup, None, &sink, &cursor_store)
//!     .await?;
//! println!("added {} records ({})", result.newly_added, result.terminated_by);
//! ```

pub mod engine;
pub mod error;
pub mod retry;
pub mod source;
pub mod testing;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use engine::{EngineConfig, SyncEngine, SyncResult, TerminatedBy};
pub use error::{MappingError, SyncError};
pub use retry::{Backoff, RetryPolicy};
pub use source::{RateLimited, SinglePage};
pub use traits::{CursorStore, PagedSource, RecordMapper, Sink};
pub use types::{cursor_preview, Cursor, DedupKey, DedupSet, Page, Record, SyncState};
