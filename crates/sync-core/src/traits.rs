//! Collaborator contracts driven by the [`SyncEngine`](crate::SyncEngine).
//!
//! Concrete implementations live in their own crates (`airtable-client`,
//! `instagram-source`, `checkpoint`) so the engine stays independent of any
//! protocol. The engine is generic over these traits; after the CLI picks the
//! concrete types, every call is statically dispatched.

use anyhow::Result;
use async_trait::async_trait;

use crate::error::MappingError;
use crate::types::{Cursor, DedupKey, Page, Record};

/// An externally paginated collection.
///
/// Implementations must be idempotent per cursor value: repeating a fetch
/// with the same cursor after a crash yields the same records or a safe
/// superset. Rate limiting and retries belong to the implementation (see
/// [`RateLimited`](crate::RateLimited)), never to the engine.
#[async_trait]
pub trait PagedSource: Send + Sync {
    /// Fetch the page starting at `cursor` (`None` for the first page).
    ///
    /// Returns `Ok(None)` when the remote API answered without any data
    /// payload, which the engine treats as the end of the run.
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Option<Page>>;
}

/// Batched writer against the destination store.
#[async_trait]
pub trait Sink<T: Sync>: Send + Sync {
    /// Largest batch `write_batch` accepts.
    fn max_batch_size(&self) -> usize;

    /// Write a batch of at most `max_batch_size()` records.
    ///
    /// Partial failure is not distinguished: an error means the batch as a
    /// whole is considered failed.
    async fn write_batch(&self, batch: &[T]) -> Result<()>;
}

/// Per-entity resume cursor persistence.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the saved resume point for `entity`, if any.
    async fn load(&self, entity: &str) -> Result<Option<Cursor>>;

    /// Save the resume point for `entity`.
    ///
    /// Saving `None` records that the last fetched page had no successor.
    async fn save(&self, entity: &str, cursor: Option<&Cursor>) -> Result<()>;

    /// Forget the resume point for `entity`.
    async fn clear(&self, entity: &str) -> Result<()>;

    /// Mark `entity` as fully synced after its pages were exhausted.
    ///
    /// `added` is the number of records written by the finishing run.
    async fn mark_fully_synced(&self, entity: &str, added: u64) -> Result<()> {
        let _ = (entity, added);
        Ok(())
    }
}

/// Dedup key extraction and destination schema mapping for one record type.
pub trait RecordMapper: Send + Sync {
    /// Destination representation written to the sink.
    type Output: Send + Sync;

    /// Derive the deduplication key of a record.
    fn key(&self, record: &Record) -> Result<DedupKey, MappingError>;

    /// Map a record into the destination schema.
    fn map(&self, record: &Record) -> Result<Self::Output, MappingError>;
}
