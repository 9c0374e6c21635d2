//! Accounts similar to each unprocessed target into the network table.

use anyhow::Result;
use clap::Parser;
use serde_json::Value;
use std::time::Duration;

use airtable_client::{Fields, ListQuery};
use checkpoint::NullStore;
use sync_core::{DedupSet, SinglePage, SyncEngine};

use super::mappers::SimilarAccountMapper;
use super::{table_sink, CommandSummary};
use crate::config::parse_duration_arg;
use crate::{AirtableOpts, RapidApiOpts, SyncOpts};

/// Targets not yet processed.
pub const UNPROCESSED_FORMULA: &str = "{Processed} != TRUE()";

const NETWORK_BATCH_SIZE: usize = 10;

#[derive(Parser, Clone, Debug)]
pub struct SimilarAccountsArgs {
    /// Table of target accounts
    #[arg(long, env = "AIRTABLE_TARGETS_TABLE")]
    pub targets_table: String,

    /// Table receiving the similar accounts
    #[arg(long, env = "AIRTABLE_NETWORK_TABLE")]
    pub network_table: String,

    /// Field of the network table used for deduplication
    #[arg(long, default_value = "username")]
    pub dedup_field: String,

    /// Pause between targets
    #[arg(long, default_value = "1s", value_parser = parse_duration_arg)]
    pub target_pause: Duration,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub rapidapi: RapidApiOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

pub async fn run(args: SimilarAccountsArgs) -> Result<()> {
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry.clone())?;
    let instagram = args.rapidapi.client()?;

    let query = ListQuery::new().filter(UNPROCESSED_FORMULA);
    let targets = airtable.list_all(&args.targets_table, &query).await?;
    if targets.is_empty() {
        tracing::info!("No unprocessed targets found");
        return Ok(());
    }
    tracing::info!("Found {} unprocessed targets", targets.len());

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
    let config = args.sync.engine_config(NETWORK_BATCH_SIZE);

    let mut processed = Fields::new();
    processed.insert("Processed".to_string(), Value::Bool(true));

    let mut summary = CommandSummary::default();
    for target in &targets {
        let Some(username) = target.fields.get_str("username") else {
            summary.skip(&target.id, "no username");
            continue;
        };
        tracing::info!("Processing username: {}", username);

        let accounts = match retry
            .run("Fetching similar accounts", || {
                instagram.similar_accounts(username)
            })
            .await
        {
            Ok(accounts) => accounts,
            Err(e) => {
                tracing::warn!("Failed to fetch similar accounts for {}: {:#}", username, e);
                summary.skip(username, "similar accounts unavailable");
                continue;
            }
        };
        if accounts.is_empty() {
            // Private, new or small accounts; retried on the next run
            summary.skip(username, "no similar accounts found");
            continue;
        }

        let engine = SyncEngine::new(SimilarAccountMapper::new(&target.id), config.clone());
        let result = engine
            .run(
                &target.id,
                &SinglePage::new(accounts),
                &mut dedup,
                args.sync.target,
                sink.as_ref(),
                &NullStore,
            )
            .await?;
        summary.record(username, &result);

        if args.sync.dry_run {
            tracing::info!("[dry-run] would mark {} as processed", username);
        } else {
            airtable
                .update_record(&args.targets_table, &target.id, &processed)
                .await?;
            tracing::info!("Marked {} as processed", username);
        }

        if !args.target_pause.is_zero() {
            tokio::time::sleep(args.target_pause).await;
        }
    }

    summary.log("Similar accounts scrape");
    Ok(())
}
