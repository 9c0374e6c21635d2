//! Profile details for selected network accounts.

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use airtable_client::{Fields, ListQuery};
use sync_core::Record;

use super::EnrichSummary;
use crate::{AirtableOpts, RapidApiOpts, SyncOpts};

/// Set once details were fetched; records with it are skipped.
pub const FOLLOWER_COUNT_FIELD: &str = "Follower Count";

#[derive(Parser, Clone, Debug)]
pub struct AccountInfoArgs {
    /// Table holding the accounts
    #[arg(long, env = "AIRTABLE_BUSINESS_NETWORK_TABLE")]
    pub table: String,

    /// View selecting the accounts to enrich
    #[arg(long, env = "AIRTABLE_BUSINESS_NETWORK_FEMALE_VIEW")]
    pub view: Option<String>,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub rapidapi: RapidApiOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

/// Airtable fields for a user info payload.
///
/// The four core fields are always written, `null` when absent. Count and
/// contact fields are only written when the profile exposes them.
pub fn account_update(info: &Record) -> Fields {
    let mut fields = Fields::new();
    for (field, source) in [
        ("Bio", "biography"),
        ("Bio Link", "external_url"),
        ("Follower Count", "follower_count"),
        ("Following Count", "following_count"),
    ] {
        fields.insert(
            field.to_string(),
            info.get(source).cloned().unwrap_or(Value::Null),
        );
    }
    for (field, source) in [
        ("Media Count", "media_count"),
        ("Email", "public_email"),
        ("Phone Number", "contact_phone_number"),
    ] {
        if let Some(value) = info.get(source).filter(|v| v.as_str() != Some("")) {
            fields.insert(field.to_string(), value.clone());
        }
    }
    fields
}

pub async fn run(args: AccountInfoArgs) -> Result<()> {
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry.clone())?;
    let instagram = args.rapidapi.client()?;

    let query = ListQuery::new().maybe_view(args.view.as_deref());
    let accounts = airtable.list_all(&args.table, &query).await?;
    if accounts.is_empty() {
        tracing::info!("No accounts found needing info fetch");
        return Ok(());
    }
    tracing::info!("Found {} accounts to process", accounts.len());

    let mut summary = EnrichSummary::default();
    let mut requested = false;
    for account in &accounts {
        if summary.target_reached(args.sync.target) {
            tracing::info!("Reached target of {} processed accounts", summary.processed());
            break;
        }
        if account.fields.get(FOLLOWER_COUNT_FIELD).is_some() {
            summary.skipped += 1;
            continue;
        }
        let lookup = account
            .fields
            .get_str("Username")
            .map(str::to_string)
            .or_else(|| account.fields.get_id("Pk Id"));
        let Some(lookup) = lookup else {
            tracing::info!("No username found for {}, skipping", account.id);
            summary.skipped += 1;
            continue;
        };

        if requested && !retry.request_delay.is_zero() {
            tokio::time::sleep(retry.request_delay).await;
        }
        requested = true;

        tracing::info!("Processing info for {}", lookup);
        let info = match retry
            .run("Fetching user info", || instagram.user_info(&lookup))
            .await
        {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::warn!("Could not get user info for {}", lookup);
                summary.failed += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!("Failed to fetch user info for {}: {:#}", lookup, e);
                summary.failed += 1;
                continue;
            }
        };

        let update = account_update(&info);
        if args.sync.dry_run {
            tracing::info!("[dry-run] would update {}: {}", lookup, serde_json::Value::Object(update));
            summary.updated += 1;
            continue;
        }
        match airtable.update_record(&args.table, &account.id, &update).await {
            Ok(_) => {
                tracing::info!("Updated info for {}", lookup);
                summary.updated += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to update info for {}: {:#}", lookup, e);
                summary.failed += 1;
            }
        }
    }

    summary.log("Account info fetch");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_update_full_profile() {
        let info = Record::from_value(json!({
            "username": "gina",
            "biography": "Yoga instructor",
            "external_url": "https://gina.example",
            "follower_count": 5400,
            "following_count": 310,
            "media_count": 87,
            "public_email": "gina@example.com",
            "contact_phone_number": ""
        }))
        .unwrap();

        assert_eq!(
            Value::Object(account_update(&info)),
            json!({
                "Bio": "Yoga instructor",
                "Bio Link": "https://gina.example",
                "Follower Count": 5400,
                "Following Count": 310,
                "Media Count": 87,
                "Email": "gina@example.com"
            })
        );
    }

    #[test]
    fn test_account_update_sparse_profile() {
        let info = Record::from_value(json!({ "follower_count": 12, "biography": null })).unwrap();
        assert_eq!(
            Value::Object(account_update(&info)),
            json!({
                "Bio": null,
                "Bio Link": null,
                "Follower Count": 12,
                "Following Count": null
            })
        );
    }
}
