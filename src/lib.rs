//! social-sync library
//!
//! Pulls Instagram accounts, followers and location posts from the RapidAPI
//! scraper into Airtable tables, skipping anything the destination already
//! holds.
//!
//! # Features
//!
//! - Global deduplication: every command loads the destination's existing
//!   keys first and never writes a key twice
//! - Resumable pagination: follower scraping resumes from the token saved on
//!   the target's record
//! - Enrichment: gender labels from profile pictures, profile details for
//!   selected accounts
//!
//! # CLI Usage
//!
//! ```bash
//! # Scrape followers of every unscraped business target
//! social-sync business-network --targets-table "Business Targets" --network-table "Business Network"
//!
//! # Scrape up to 300 posts per location in a view
//! social-sync location-posts --locations-view "🔥 Locations" --limit 300
//!
//! # Promote network accounts of a view to targets
//! social-sync network-to-targets --network-table Network --view Qualified --targets-table Targets
//!
//! # Label accounts without a gender check
//! social-sync gender-label --table "Business Network"
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use airtable_client::{AirtableClient, AirtableConfig};
use checkpoint::CursorStorage;
use instagram_source::{RapidApiClient, RapidApiConfig};
use sync_core::{Backoff, EngineConfig, RetryPolicy};

pub mod config;
pub mod gender;
pub mod routines;

use config::parse_duration_arg;

#[derive(Parser, Clone, Debug)]
pub struct AirtableOpts {
    /// Airtable personal access token
    #[arg(long, env = "AIRTABLE_API_KEY", hide_env_values = true)]
    pub airtable_api_key: String,

    /// Airtable base id
    #[arg(long, env = "AIRTABLE_BASE_ID")]
    pub airtable_base_id: String,

    /// Airtable API endpoint
    #[arg(
        long,
        default_value = airtable_client::DEFAULT_ENDPOINT,
        env = "AIRTABLE_ENDPOINT"
    )]
    pub airtable_endpoint: String,
}

impl AirtableOpts {
    pub fn client(&self, retry: RetryPolicy) -> anyhow::Result<AirtableClient> {
        let config = AirtableConfig::new(&self.airtable_api_key, &self.airtable_base_id)
            .with_endpoint(&self.airtable_endpoint);
        Ok(AirtableClient::new(config)?.with_retry(retry))
    }
}

#[derive(Parser, Clone, Debug)]
pub struct RapidApiOpts {
    /// RapidAPI key
    #[arg(long, env = "RAPIDAPI_KEY", hide_env_values = true)]
    pub rapidapi_key: String,

    /// RapidAPI host header
    #[arg(
        long,
        default_value = "instagram-scraper-api2.p.rapidapi.com",
        env = "RAPIDAPI_HOST"
    )]
    pub rapidapi_host: String,

    /// Scraper API endpoint
    #[arg(
        long,
        default_value = instagram_source::DEFAULT_ENDPOINT,
        env = "RAPIDAPI_ENDPOINT"
    )]
    pub rapidapi_endpoint: String,
}

impl RapidApiOpts {
    pub fn client(&self) -> anyhow::Result<RapidApiClient> {
        let config = RapidApiConfig::new(&self.rapidapi_key, &self.rapidapi_host)
            .with_endpoint(&self.rapidapi_endpoint);
        RapidApiClient::new(config)
    }
}

#[derive(Parser, Clone, Debug)]
pub struct SyncOpts {
    /// Records per write; capped by what the destination accepts per batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Stop after this many new records per entity
    #[arg(long)]
    pub target: Option<u64>,

    /// Keep resume cursors as JSON files in this directory
    #[arg(long, env = "SOCIAL_SYNC_CHECKPOINT_DIR")]
    pub checkpoint_dir: Option<PathBuf>,

    /// Abort when a resume cursor cannot be loaded or saved
    #[arg(long)]
    pub strict_cursor: bool,

    /// Pause before every follow-up page request (e.g. 250ms, 1s)
    #[arg(long, default_value = "250ms", value_parser = parse_duration_arg)]
    pub request_delay: Duration,

    /// Delay before retrying a failed request
    #[arg(long, default_value = "2s", value_parser = parse_duration_arg)]
    pub retry_delay: Duration,

    /// Double the retry delay after each failed attempt
    #[arg(long)]
    pub exponential_backoff: bool,

    /// Retries after a failed request
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Dry run mode - don't actually write data
    #[arg(long)]
    pub dry_run: bool,
}

impl Default for SyncOpts {
    fn default() -> Self {
        Self {
            batch_size: None,
            target: None,
            checkpoint_dir: None,
            strict_cursor: false,
            request_delay: sync_core::retry::DEFAULT_REQUEST_DELAY,
            retry_delay: sync_core::retry::DEFAULT_RETRY_DELAY,
            exponential_backoff: false,
            max_retries: sync_core::retry::DEFAULT_MAX_RETRIES,
            dry_run: false,
        }
    }
}

impl SyncOpts {
    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = if self.exponential_backoff {
            Backoff::Exponential {
                base: self.retry_delay,
                max: self.retry_delay * 32,
            }
        } else {
            Backoff::Fixed(self.retry_delay)
        };
        RetryPolicy {
            request_delay: self.request_delay,
            max_retries: self.max_retries,
            backoff,
        }
    }

    /// Engine settings, using `default_batch_size` unless overridden.
    pub fn engine_config(&self, default_batch_size: usize) -> EngineConfig {
        EngineConfig {
            batch_size: self.batch_size.unwrap_or(default_batch_size).max(1),
            strict_cursor: self.strict_cursor,
        }
    }

    /// Cursor storage for commands without a destination-side cursor.
    ///
    /// Dry runs never touch the filesystem.
    pub fn cursor_storage(&self) -> CursorStorage {
        match (&self.checkpoint_dir, self.dry_run) {
            (_, true) => CursorStorage::Memory,
            (Some(dir), false) => CursorStorage::filesystem(Some(dir.clone())),
            (None, false) => CursorStorage::Disabled,
        }
    }
}
