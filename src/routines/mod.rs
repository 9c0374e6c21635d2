//! One routine per CLI command.
//!
//! Sync routines (`business_network`, `location_posts`, `location_ids`,
//! `similar_accounts`, `network_to_targets`) load the destination's existing
//! keys and run the [`SyncEngine`](sync_core::SyncEngine) once per entity
//! with a shared [`DedupSet`](sync_core::DedupSet). Enrichment routines
//! (`gender_label`, `account_info`) patch records in place.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use airtable_client::{AirtableClient, AirtableSink, Fields};
use sync_core::{Sink, SyncResult};

pub mod account_info;
pub mod business_network;
pub mod gender_label;
pub mod location_ids;
pub mod location_posts;
pub mod mappers;
pub mod network_to_targets;
pub mod similar_accounts;

/// Sink that logs batches instead of writing them.
pub struct DryRunSink {
    max_batch_size: usize,
    written: AtomicU64,
}

impl DryRunSink {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
            written: AtomicU64::new(0),
        }
    }

    /// Records that would have been written.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Sink<Fields> for DryRunSink {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn write_batch(&self, batch: &[Fields]) -> Result<()> {
        self.written.fetch_add(batch.len() as u64, Ordering::Relaxed);
        for fields in batch {
            tracing::debug!("[dry-run] would create {}", serde_json::Value::Object(fields.clone()));
        }
        tracing::info!("[dry-run] would create batch of {} records", batch.len());
        Ok(())
    }
}

/// Sink for `table`, or a [`DryRunSink`] when `dry_run` is set.
pub fn table_sink(
    client: &AirtableClient,
    table: &str,
    max_batch_size: usize,
    dry_run: bool,
) -> Box<dyn Sink<Fields>> {
    if dry_run {
        Box::new(DryRunSink::new(max_batch_size))
    } else {
        Box::new(AirtableSink::with_max_batch_size(
            client.clone(),
            table,
            max_batch_size,
        ))
    }
}

/// Totals across the entities of one command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSummary {
    pub entities: u64,
    pub skipped_entities: u64,
    pub newly_added: u64,
    pub skipped_duplicates: u64,
    pub skipped_invalid: u64,
    /// Entities whose run ended on a fetch error
    pub partial: u64,
}

impl CommandSummary {
    /// Add one entity's result and log it.
    pub fn record(&mut self, label: &str, result: &SyncResult) {
        self.entities += 1;
        self.newly_added += result.newly_added;
        self.skipped_duplicates += result.skipped_duplicates;
        self.skipped_invalid += result.skipped_invalid;
        if result.terminated_by.is_error() {
            self.partial += 1;
            tracing::warn!(
                "{}: added {} new records before stopping ({})",
                label,
                result.newly_added,
                result.terminated_by
            );
        } else {
            tracing::info!(
                "{}: added {} new records, skipped {} duplicates ({})",
                label,
                result.newly_added,
                result.skipped_duplicates,
                result.terminated_by
            );
        }
    }

    pub fn skip(&mut self, label: &str, reason: &str) {
        self.skipped_entities += 1;
        tracing::info!("Skipping {}: {}", label, reason);
    }

    pub fn log(&self, command: &str) {
        tracing::info!(
            "{} completed: {} entities processed, {} skipped, {} new records, {} duplicates, {} invalid, {} partial",
            command,
            self.entities,
            self.skipped_entities,
            self.newly_added,
            self.skipped_duplicates,
            self.skipped_invalid,
            self.partial
        );
    }
}

/// Counts of an in-place enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichSummary {
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl EnrichSummary {
    /// Records sent to the enrichment service, successfully or not.
    pub fn processed(&self) -> u64 {
        self.updated + self.failed
    }

    /// Whether `target` processed records were reached. Skipped records do
    /// not count.
    pub fn target_reached(&self, target: Option<u64>) -> bool {
        target.is_some_and(|t| self.processed() >= t)
    }

    pub fn log(&self, command: &str) {
        tracing::info!(
            "{} completed: {} updated, {} skipped, {} failed",
            command,
            self.updated,
            self.skipped,
            self.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::testing::{users, RecordingCursorStore, ScriptedSource};
    use sync_core::{DedupSet, EngineConfig, SyncEngine, TerminatedBy};

    use crate::routines::mappers::FollowerMapper;

    #[tokio::test]
    async fn test_dry_run_sink_counts_without_writing() {
        let source = ScriptedSource::new()
            .page(None, users(&["alice", "bob"]), Some("tok1"))
            .page(Some("tok1"), users(&["carol"]), None);
        let sink = DryRunSink::new(2);
        let mut dedup = DedupSet::default();

        let result = SyncEngine::new(FollowerMapper::new("recT"), EngineConfig::default())
            .run("recT", &source, &mut dedup, None, &sink, &RecordingCursorStore::new())
            .await
            .unwrap();

        assert_eq!(result.newly_added, 3);
        assert_eq!(result.batches_written, 2);
        assert_eq!(sink.written(), 3);
    }

    #[test]
    fn test_enrich_target_ignores_skipped() {
        let mut summary = EnrichSummary {
            skipped: 5,
            ..Default::default()
        };
        assert!(!summary.target_reached(Some(2)));
        assert!(!summary.target_reached(None));
        assert!(summary.target_reached(Some(0)));

        summary.updated = 1;
        summary.failed = 1;
        assert_eq!(summary.processed(), 2);
        assert!(summary.target_reached(Some(2)));
        assert!(!summary.target_reached(Some(3)));
    }

    #[test]
    fn test_summary_accumulates() {
        let mut summary = CommandSummary::default();
        let mut first = SyncResult {
            entity: "recA".to_string(),
            newly_added: 3,
            skipped_duplicates: 1,
            skipped_invalid: 0,
            pages_fetched: 2,
            batches_written: 1,
            terminated_by: TerminatedBy::Exhausted,
            last_cursor: None,
        };
        summary.record("alice", &first);
        first.terminated_by = TerminatedBy::Error("timeout".to_string());
        first.skipped_invalid = 2;
        summary.record("bob", &first);
        summary.skip("carol", "no username");

        assert_eq!(
            summary,
            CommandSummary {
                entities: 2,
                skipped_entities: 1,
                newly_added: 6,
                skipped_duplicates: 2,
                skipped_invalid: 2,
                partial: 1,
            }
        );
    }
}
