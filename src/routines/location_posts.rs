//! Recent posts of tracked locations into the location posts table.
//!
//! Each location is scraped until it holds `limit` posts in total, one post
//! per author across all locations.

use anyhow::Result;
use clap::Parser;

use airtable_client::{AirtableRecord, ListQuery};
use instagram_source::LocationPostsSource;
use sync_core::{DedupSet, RateLimited, SyncEngine};

use super::mappers::LocationPostMapper;
use super::{table_sink, CommandSummary};
use crate::{AirtableOpts, RapidApiOpts, SyncOpts};

/// Posts kept per location.
pub const DEFAULT_POSTS_PER_LOCATION: u64 = 300;

const POST_BATCH_SIZE: usize = 10;

#[derive(Parser, Clone, Debug)]
pub struct LocationPostsArgs {
    /// Table of tracked locations
    #[arg(long, env = "AIRTABLE_LOCATIONS_TABLE")]
    pub locations_table: String,

    /// View of the locations table to scrape
    #[arg(long, env = "AIRTABLE_FIRE_LOCATIONS_VIEW")]
    pub locations_view: Option<String>,

    /// Table receiving the posts
    #[arg(long, env = "AIRTABLE_LOCATION_POSTS_TABLE")]
    pub posts_table: String,

    /// Field of the posts table used for deduplication
    #[arg(long, default_value = "Username")]
    pub dedup_field: String,

    /// Posts to keep per location
    #[arg(long, default_value_t = DEFAULT_POSTS_PER_LOCATION)]
    pub limit: u64,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub rapidapi: RapidApiOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

/// Posts still needed for `location`, or `None` when it is full.
///
/// `--target` further caps the per-location amount.
pub fn posts_needed(location: &AirtableRecord, limit: u64, cap: Option<u64>) -> Option<u64> {
    let scraped = location
        .fields
        .get_i64("Total Posts Scraped For Location")
        .unwrap_or(0)
        .max(0) as u64;
    let needed = limit.saturating_sub(scraped);
    if needed == 0 {
        return None;
    }
    Some(cap.map_or(needed, |cap| needed.min(cap)))
}

pub async fn run(args: LocationPostsArgs) -> Result<()> {
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry.clone())?;
    let instagram = args.rapidapi.client()?;

    if args.sync.dry_run {
        tracing::info!("Running in dry-run mode - no data will be written");
    }

    let query = ListQuery::new().maybe_view(args.locations_view.as_deref());
    let locations = airtable.list_all(&args.locations_table, &query).await?;
    if locations.is_empty() {
        tracing::info!("No locations found in table '{}'", args.locations_table);
        return Ok(());
    }

    let existing = airtable
        .existing_keys(&args.posts_table, &args.dedup_field)
        .await?;
    let mut dedup = DedupSet::new(existing);

    let sink = table_sink(
        &airtable,
        &args.posts_table,
        POST_BATCH_SIZE,
        args.sync.dry_run,
    );
    let cursor_store = args.sync.cursor_storage().build();
    let config = args.sync.engine_config(POST_BATCH_SIZE);

    let mut summary = CommandSummary::default();
    for location in &locations {
        let name = location
            .fields
            .get_str("Location Name")
            .unwrap_or(location.id.as_str());

        let Some(needed) = posts_needed(location, args.limit, args.sync.target) else {
            summary.skip(name, &format!("{} posts already scraped", args.limit));
            continue;
        };
        let Some(location_id) = location.fields.get_id("Location Id") else {
            summary.skip(name, "no location id");
            continue;
        };
        tracing::info!("Need to scrape {} more posts for {}", needed, name);

        let source = RateLimited::new(
            LocationPostsSource::new(instagram.clone(), location_id),
            retry.clone(),
        );
        let engine = SyncEngine::new(LocationPostMapper::new(&location.id), config.clone());
        let result = engine
            .run(
                &location.id,
                &source,
                &mut dedup,
                Some(needed),
                sink.as_ref(),
                cursor_store.as_ref(),
            )
            .await?;
        summary.record(name, &result);
    }

    summary.log("Location posts scrape");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn location(scraped: serde_json::Value) -> AirtableRecord {
        serde_json::from_value(json!({
            "id": "recLoc",
            "fields": { "Location Name": "Canggu", "Total Posts Scraped For Location": scraped }
        }))
        .unwrap()
    }

    #[test]
    fn test_posts_needed() {
        assert_eq!(posts_needed(&location(json!(0)), 300, None), Some(300));
        assert_eq!(posts_needed(&location(json!(120)), 300, None), Some(180));
        assert_eq!(posts_needed(&location(json!(300)), 300, None), None);
        assert_eq!(posts_needed(&location(json!(450)), 300, None), None);
        assert_eq!(posts_needed(&location(json!(null)), 300, None), Some(300));
        assert_eq!(posts_needed(&location(json!(120)), 300, Some(50)), Some(50));
    }
}
