//! Command-line interface for social-sync
//!
//! # Usage Examples
//!
//! ## Follower and post scraping
//! ```bash
//! # Followers of every business target not yet scraped, resuming from the
//! # token saved on each target
//! social-sync business-network \
//!   --targets-table "Business Targets" \
//!   --network-table "Business Network"
//!
//! # Up to 300 posts per location of a view
//! social-sync location-posts \
//!   --locations-table Locations --locations-view "🔥 Locations" \
//!   --posts-table "Location Posts" --limit 300
//!
//! # New location ids for a search term
//! social-sync location-ids --search Bali --locations-table Locations
//!
//! # Similar accounts of every unprocessed target
//! social-sync similar-accounts --targets-table Targets --network-table Network
//!
//! # Network accounts of a view into the targets table
//! social-sync network-to-targets --network-table Network --view Qualified \
//!   --targets-table Targets
//! ```
//!
//! ## Enrichment
//! ```bash
//! social-sync gender-label --table location-posts --posts-table "Location Posts"
//! social-sync account-info --table "Business Network" --view "Female"
//! ```
//!
//! Credentials come from `AIRTABLE_API_KEY`, `AIRTABLE_BASE_ID`,
//! `RAPIDAPI_KEY` and `PICPURIFY_API_KEY`. `RUST_LOG` controls verbosity.

use clap::{Parser, Subcommand};
use social_sync::routines::{
    account_info::{self, AccountInfoArgs},
    business_network::{self, BusinessNetworkArgs},
    gender_label::{self, GenderLabelArgs},
    location_ids::{self, LocationIdsArgs},
    location_posts::{self, LocationPostsArgs},
    network_to_targets::{self, NetworkToTargetsArgs},
    similar_accounts::{self, SimilarAccountsArgs},
};

#[derive(Parser)]
#[command(name = "social-sync")]
#[command(about = "Sync Instagram accounts and posts into Airtable without duplicates")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape followers of business targets into the network table
    BusinessNetwork(BusinessNetworkArgs),

    /// Scrape recent posts of tracked locations
    LocationPosts(LocationPostsArgs),

    /// Add locations matching a search term
    LocationIds(LocationIdsArgs),

    /// Add accounts similar to each unprocessed target
    SimilarAccounts(SimilarAccountsArgs),

    /// Copy network accounts into the targets table
    NetworkToTargets(NetworkToTargetsArgs),

    /// Label records with a gender detected from the profile picture
    GenderLabel(GenderLabelArgs),

    /// Fetch bio and follower counts for selected accounts
    AccountInfo(AccountInfoArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BusinessNetwork(args) => business_network::run(args).await,
        Commands::LocationPosts(args) => location_posts::run(args).await,
        Commands::LocationIds(args) => location_ids::run(args).await,
        Commands::SimilarAccounts(args) => similar_accounts::run(args).await,
        Commands::NetworkToTargets(args) => network_to_targets::run(args).await,
        Commands::GenderLabel(args) => gender_label::run(args).await,
        Commands::AccountInfo(args) => account_info::run(args).await,
    }
}
