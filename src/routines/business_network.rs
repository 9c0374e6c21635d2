//! Followers of business targets into the business network table.
//!
//! Targets are the records of the targets table whose `Network Scraped` box
//! is unticked. Each target's followers are paged with the token saved on
//! the target record, so an interrupted run resumes where it stopped. When a
//! target's followers are exhausted the token is cleared and the box ticked.

use anyhow::Result;
use clap::Parser;

use airtable_client::{ListQuery, RecordFieldCursorStore};
use checkpoint::MemoryStore;
use instagram_source::FollowersSource;
use sync_core::{CursorStore, DedupSet, RateLimited, SyncEngine};

use super::mappers::FollowerMapper;
use super::{table_sink, CommandSummary};
use crate::{AirtableOpts, RapidApiOpts, SyncOpts};

/// Airtable caps creates at 10 per request; batches of 100 are split.
pub const NETWORK_BATCH_SIZE: usize = 100;

/// Targets still to be scraped.
pub const UNSCRAPED_FORMULA: &str = "{Network Scraped} != TRUE()";

#[derive(Parser, Clone, Debug)]
pub struct BusinessNetworkArgs {
    /// Table of business targets
    #[arg(long, env = "AIRTABLE_BUSINESS_TARGETS_TABLE")]
    pub targets_table: String,

    /// Table receiving the followers
    #[arg(long, env = "AIRTABLE_BUSINESS_NETWORK_TABLE")]
    pub network_table: String,

    /// Field of the network table used for deduplication
    #[arg(long, default_value = "Username")]
    pub dedup_field: String,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub rapidapi: RapidApiOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

pub async fn run(args: BusinessNetworkArgs) -> Result<()> {
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry.clone())?;
    let instagram = args.rapidapi.client()?;

    if args.sync.dry_run {
        tracing::info!("Running in dry-run mode - no data will be written");
    }

    let query = ListQuery::new().filter(UNSCRAPED_FORMULA);
    let targets = airtable.list_all(&args.targets_table, &query).await?;
    if targets.is_empty() {
        tracing::info!("No targets found needing network scrape");
        return Ok(());
    }
    tracing::info!("Found {} targets to process", targets.len());

    let existing = airtable
        .existing_keys(&args.network_table, &args.dedup_field)
        .await?;
    let mut dedup = DedupSet::new(existing);

    let sink = table_sink(
        &airtable,
        &args.network_table,
        NETWORK_BATCH_SIZE,
        args.sync.dry_run,
    );
    let cursor_store: Box<dyn CursorStore> = if args.sync.dry_run {
        Box::new(MemoryStore::new())
    } else {
        Box::new(RecordFieldCursorStore::new(
            airtable.clone(),
            &args.targets_table,
        ))
    };
    let config = args.sync.engine_config(NETWORK_BATCH_SIZE);

    let mut summary = CommandSummary::default();
    for target in &targets {
        let Some(username) = target.fields.get_str("Username") else {
            summary.skip(&target.id, "no username");
            continue;
        };
        tracing::info!("Processing followers for {}", username);

        let source = RateLimited::new(
            FollowersSource::new(instagram.clone(), username),
            retry.clone(),
        );
        let engine = SyncEngine::new(FollowerMapper::new(&target.id), config.clone());
        let result = engine
            .run(
                &target.id,
                &source,
                &mut dedup,
                args.sync.target,
                sink.as_ref(),
                cursor_store.as_ref(),
            )
            .await?;
        summary.record(username, &result);
    }

    summary.log("Business network scrape");
    Ok(())
}
