//! Paginated sync with global deduplication.
//!
//! The engine pulls pages from a [`PagedSource`], drops records whose dedup
//! key is already known, maps the rest into the destination schema and
//! writes them to a [`Sink`] in batches. The cursor of every page is saved to
//! a [`CursorStore`] as soon as the page arrives, so an interrupted run picks
//! up where it left off instead of rescanning the whole collection.
//!
//! # Cursor ordering
//!
//! The next-cursor of a page is persisted *before* its records are written.
//! If the process dies after the save but before the page's tail is flushed,
//! the resumed run starts after that page and the unflushed tail is never
//! written. Cursor save failures are logged and ignored unless
//! [`EngineConfig::strict_cursor`] is set.

use std::fmt;

use crate::error::{MappingError, SyncError};
use crate::traits::{CursorStore, PagedSource, RecordMapper, Sink};
use crate::types::{cursor_preview, Cursor, DedupSet, Record};

/// Default number of records per sink write.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Engine configuration that stays fixed across the entities of a command.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Records per sink write; capped by the sink's own maximum.
    pub batch_size: usize,

    /// Abort the run when the cursor store fails instead of logging and
    /// continuing.
    pub strict_cursor: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            strict_cursor: false,
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminatedBy {
    /// The requested number of new records was accepted.
    TargetReached,
    /// The source returned a page without a next cursor.
    Exhausted,
    /// The source failed or returned no data; the run is a partial success.
    Error(String),
}

impl TerminatedBy {
    pub fn as_str(&self) -> &str {
        match self {
            TerminatedBy::TargetReached => "target_reached",
            TerminatedBy::Exhausted => "exhausted",
            TerminatedBy::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TerminatedBy::Error(_))
    }
}

impl fmt::Display for TerminatedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminatedBy::Error(reason) => write!(f, "error: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Outcome of one engine run for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub entity: String,
    /// Records accepted and written to the sink
    pub newly_added: u64,
    /// Records skipped because their key was already known
    pub skipped_duplicates: u64,
    /// Records skipped because they could not be mapped
    pub skipped_invalid: u64,
    pub pages_fetched: u64,
    pub batches_written: u64,
    pub terminated_by: TerminatedBy,
    /// Last cursor received from the source (`None` once exhausted)
    pub last_cursor: Option<Cursor>,
}

impl SyncResult {
    fn new(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            newly_added: 0,
            skipped_duplicates: 0,
            skipped_invalid: 0,
            pages_fetched: 0,
            batches_written: 0,
            terminated_by: TerminatedBy::Exhausted,
            last_cursor: None,
        }
    }
}

/// Drives the fetch, dedupe and batch-write loop for one record type.
pub struct SyncEngine<M> {
    mapper: M,
    config: EngineConfig,
}

impl<M: RecordMapper> SyncEngine<M> {
    pub fn new(mapper: M, config: EngineConfig) -> Self {
        Self { mapper, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Sync one entity from `source` into `sink`.
    ///
    /// `dedup` is the global dedup domain; keys accepted here are added to it
    /// so later entities of the same command skip them. `target` bounds the
    /// number of new records accepted (`None` for unbounded).
    ///
    /// Fetch failures end the run with [`TerminatedBy::Error`] after flushing
    /// what was already accepted. Sink failures abort immediately with
    /// [`SyncError::Write`].
    pub async fn run<P, S, C>(
        &self,
        entity: &str,
        source: &P,
        dedup: &mut DedupSet,
        target: Option<u64>,
        sink: &S,
        cursor_store: &C,
    ) -> Result<SyncResult, SyncError>
    where
        P: PagedSource + ?Sized,
        S: Sink<M::Output> + ?Sized,
        C: CursorStore + ?Sized,
    {
        let batch_size = self.config.batch_size.min(sink.max_batch_size()).max(1);
        let mut result = SyncResult::new(entity);
        let mut batch: Vec<M::Output> = Vec::with_capacity(batch_size);

        let mut cursor = match cursor_store.load(entity).await {
            Ok(cursor) => cursor,
            Err(e) if self.config.strict_cursor => {
                return Err(SyncError::CursorPersist {
                    entity: entity.to_string(),
                    reason: format!("{e:#}"),
                });
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load cursor for {entity}, starting from the first page: {e:#}"
                );
                None
            }
        };
        if let Some(c) = &cursor {
            tracing::info!("Resuming {entity} from saved cursor {}", cursor_preview(c));
        }
        result.last_cursor = cursor.clone();

        let terminated_by = loop {
            if target_reached(result.newly_added, target) {
                break TerminatedBy::TargetReached;
            }

            let page = match source.fetch(cursor.as_ref()).await {
                Ok(Some(page)) => page,
                Ok(None) => {
                    tracing::warn!("No data returned for {entity}");
                    break TerminatedBy::Error("no data returned by source".to_string());
                }
                Err(e) => {
                    tracing::warn!("Fetching page for {entity} failed: {e:#}");
                    break TerminatedBy::Error(format!("{e:#}"));
                }
            };
            result.pages_fetched += 1;

            // Saved before the page is processed; see module docs.
            self.persist_cursor(entity, page.next_cursor.as_ref(), cursor_store)
                .await?;
            cursor = page.next_cursor.clone();
            result.last_cursor = cursor.clone();

            let mut page_added = 0u64;
            let mut page_duplicates = 0u64;
            for record in &page.records {
                let mapped = match self.accept(record, dedup) {
                    Accepted::New(mapped) => mapped,
                    Accepted::Duplicate(key) => {
                        tracing::debug!("{key} already exists in destination or current run");
                        page_duplicates += 1;
                        continue;
                    }
                    Accepted::Invalid(e) => {
                        tracing::debug!("Skipping record for {entity}: {e}");
                        result.skipped_invalid += 1;
                        continue;
                    }
                };

                batch.push(mapped);
                result.newly_added += 1;
                page_added += 1;

                if batch.len() >= batch_size {
                    self.flush(entity, &mut batch, sink, &mut result).await?;
                }
                if target_reached(result.newly_added, target) {
                    break;
                }
            }
            result.skipped_duplicates += page_duplicates;

            tracing::info!(
                "Page {} for {}: {} new, {} duplicates (total new: {})",
                result.pages_fetched,
                entity,
                page_added,
                page_duplicates,
                result.newly_added
            );

            if target_reached(result.newly_added, target) {
                break TerminatedBy::TargetReached;
            }
            match &cursor {
                Some(c) => tracing::debug!("Fetching next page with cursor {}", cursor_preview(c)),
                None => break TerminatedBy::Exhausted,
            }
        };

        if !batch.is_empty() {
            self.flush(entity, &mut batch, sink, &mut result).await?;
        }

        if terminated_by == TerminatedBy::Exhausted {
            self.finish(entity, result.newly_added, cursor_store)
                .await?;
        }

        tracing::info!(
            "Finished {}: {} new records in {} batches, {} duplicates, {} invalid ({})",
            entity,
            result.newly_added,
            result.batches_written,
            result.skipped_duplicates,
            result.skipped_invalid,
            terminated_by
        );

        result.terminated_by = terminated_by;
        Ok(result)
    }

    /// Classify a record against the dedup set, registering it when new.
    fn accept(&self, record: &Record, dedup: &mut DedupSet) -> Accepted<M::Output> {
        let key = match self.mapper.key(record) {
            Ok(key) => key,
            Err(e) => return Accepted::Invalid(e),
        };
        if dedup.contains(&key) {
            return Accepted::Duplicate(key);
        }
        match self.mapper.map(record) {
            Ok(mapped) => {
                dedup.insert(key);
                Accepted::New(mapped)
            }
            Err(e) => Accepted::Invalid(e),
        }
    }

    async fn flush<S>(
        &self,
        entity: &str,
        batch: &mut Vec<M::Output>,
        sink: &S,
        result: &mut SyncResult,
    ) -> Result<(), SyncError>
    where
        S: Sink<M::Output> + ?Sized,
    {
        let batch_len = batch.len();
        if let Err(e) = sink.write_batch(batch.as_slice()).await {
            tracing::error!("Error writing batch for {entity}, stopping: {e:#}");
            return Err(SyncError::Write {
                entity: entity.to_string(),
                batch_len,
                committed: result.newly_added - batch_len as u64,
                reason: format!("{e:#}"),
            });
        }
        batch.clear();
        result.batches_written += 1;
        tracing::info!(
            "Wrote batch of {} records for {} (total new: {})",
            batch_len,
            entity,
            result.newly_added
        );
        Ok(())
    }

    async fn persist_cursor<C>(
        &self,
        entity: &str,
        cursor: Option<&Cursor>,
        cursor_store: &C,
    ) -> Result<(), SyncError>
    where
        C: CursorStore + ?Sized,
    {
        match cursor_store.save(entity, cursor).await {
            Ok(()) => {
                if let Some(c) = cursor {
                    tracing::debug!("Saved cursor {} for {entity}", cursor_preview(c));
                }
                Ok(())
            }
            Err(e) => self.cursor_failure(entity, "save cursor", e),
        }
    }

    async fn finish<C>(&self, entity: &str, added: u64, cursor_store: &C) -> Result<(), SyncError>
    where
        C: CursorStore + ?Sized,
    {
        if let Err(e) = cursor_store.clear(entity).await {
            return self.cursor_failure(entity, "clear cursor", e);
        }
        if let Err(e) = cursor_store.mark_fully_synced(entity, added).await {
            return self.cursor_failure(entity, "mark as fully synced", e);
        }
        tracing::info!("Marked {entity} as fully synced");
        Ok(())
    }

    fn cursor_failure(
        &self,
        entity: &str,
        action: &str,
        error: anyhow::Error,
    ) -> Result<(), SyncError> {
        if self.config.strict_cursor {
            return Err(SyncError::CursorPersist {
                entity: entity.to_string(),
                reason: format!("failed to {action}: {error:#}"),
            });
        }
        tracing::warn!("Failed to {action} for {entity}, continuing: {error:#}");
        Ok(())
    }
}

enum Accepted<T> {
    New(T),
    Duplicate(String),
    Invalid(MappingError),
}

fn target_reached(added: u64, target: Option<u64>) -> bool {
    target.is_some_and(|t| added >= t)
}
