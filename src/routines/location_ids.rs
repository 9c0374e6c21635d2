//! Location search results into the locations table.

use anyhow::Result;
use clap::Parser;

use checkpoint::NullStore;
use sync_core::{DedupSet, SinglePage, SyncEngine};

use super::mappers::LocationMapper;
use super::{table_sink, CommandSummary};
use crate::{AirtableOpts, RapidApiOpts, SyncOpts};

const LOCATION_BATCH_SIZE: usize = 10;

#[derive(Parser, Clone, Debug)]
pub struct LocationIdsArgs {
    /// Place to search for (e.g. 'London', 'Bali')
    #[arg(long)]
    pub search: String,

    /// Table of tracked locations
    #[arg(long, env = "AIRTABLE_LOCATIONS_TABLE")]
    pub locations_table: String,

    /// Field of the locations table used for deduplication
    #[arg(long, default_value = "Id")]
    pub dedup_field: String,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub rapidapi: RapidApiOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

pub async fn run(args: LocationIdsArgs) -> Result<()> {
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry.clone())?;
    let instagram = args.rapidapi.client()?;

    let search = args.search.trim();
    if search.is_empty() {
        anyhow::bail!("Search term must not be empty");
    }

    let locations = retry
        .run("Searching locations", || instagram.search_location(search))
        .await?;
    if locations.is_empty() {
        tracing::info!("No locations returned for '{}'", search);
        return Ok(());
    }
    tracing::info!("Found {} locations for '{}'", locations.len(), search);

    let existing = airtable
        .existing_keys(&args.locations_table, &args.dedup_field)
        .await?;
    let mut dedup = DedupSet::new(existing);

    let sink = table_sink(
        &airtable,
        &args.locations_table,
        LOCATION_BATCH_SIZE,
        args.sync.dry_run,
    );
    let engine = SyncEngine::new(
        LocationMapper::new(search),
        args.sync.engine_config(LOCATION_BATCH_SIZE),
    );
    let result = engine
        .run(
            search,
            &SinglePage::new(locations),
            &mut dedup,
            args.sync.target,
            sink.as_ref(),
            &NullStore,
        )
        .await?;

    let mut summary = CommandSummary::default();
    summary.record(search, &result);
    summary.log("Location search");
    Ok(())
}
