//! Network accounts into the targets table.

use anyhow::Result;
use clap::Parser;
use serde_json::Value;

use airtable_client::{AirtableRecord, Fields, ListQuery};
use checkpoint::NullStore;
use sync_core::{DedupSet, SinglePage, SyncEngine};

use super::mappers::TargetMapper;
use super::{table_sink, CommandSummary, EnrichSummary};
use crate::{AirtableOpts, SyncOpts};

/// Network accounts not yet converted.
pub const UNCONVERTED_FORMULA: &str = "{converted_to_target} != TRUE()";

/// Set on a network row once its account is in the targets table.
pub const CONVERTED_FIELD: &str = "converted_to_target";

const TARGET_BATCH_SIZE: usize = 10;

#[derive(Parser, Clone, Debug)]
pub struct NetworkToTargetsArgs {
    /// Table of network accounts to convert
    #[arg(long, env = "AIRTABLE_NETWORK_TABLE")]
    pub network_table: String,

    /// View narrowing the accounts to convert
    #[arg(long, env = "AIRTABLE_NETWORK_VIEW")]
    pub view: Option<String>,

    /// Table receiving the new targets
    #[arg(long, env = "AIRTABLE_TARGETS_TABLE")]
    pub targets_table: String,

    /// Username field, in both tables, used for deduplication
    #[arg(long, default_value = "username")]
    pub dedup_field: String,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

/// Network rows whose username is now present in the targets table.
pub fn converted_accounts<'a>(
    accounts: &'a [AirtableRecord],
    field: &str,
    targets: &DedupSet,
) -> Vec<&'a AirtableRecord> {
    accounts
        .iter()
        .filter(|account| {
            account
                .fields
                .get_id(field)
                .is_some_and(|username| !username.is_empty() && targets.contains(&username))
        })
        .collect()
}

pub async fn run(args: NetworkToTargetsArgs) -> Result<()> {
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry)?;

    let query = ListQuery::new()
        .maybe_view(args.view.as_deref())
        .filter(UNCONVERTED_FORMULA);
    let accounts = airtable.list_all(&args.network_table, &query).await?;
    if accounts.is_empty() {
        tracing::info!("No network accounts left to convert");
        return Ok(());
    }
    tracing::info!("Found {} network accounts to convert", accounts.len());

    let existing = airtable
        .existing_keys(&args.targets_table, &args.dedup_field)
        .await?;
    let mut dedup = DedupSet::new(existing);

    let sink = table_sink(
        &airtable,
        &args.targets_table,
        TARGET_BATCH_SIZE,
        args.sync.dry_run,
    );
    let engine = SyncEngine::new(
        TargetMapper::new(&args.dedup_field),
        args.sync.engine_config(TARGET_BATCH_SIZE),
    );
    let page = SinglePage::new(accounts.iter().map(|a| a.fields.clone()).collect());
    let result = engine
        .run(
            &args.network_table,
            &page,
            &mut dedup,
            args.sync.target,
            sink.as_ref(),
            &NullStore,
        )
        .await?;

    let mut summary = CommandSummary::default();
    summary.record(&args.network_table, &result);
    summary.log("Network conversion");

    let mut converted = Fields::new();
    converted.insert(CONVERTED_FIELD.to_string(), Value::Bool(true));

    let mut marked = EnrichSummary::default();
    for account in converted_accounts(&accounts, &args.dedup_field, &dedup) {
        let username = account.fields.get_str(&args.dedup_field).unwrap_or(&account.id);
        if args.sync.dry_run {
            tracing::info!("[dry-run] would mark {} as converted", username);
            marked.updated += 1;
            continue;
        }
        match airtable
            .update_record(&args.network_table, &account.id, &converted)
            .await
        {
            Ok(_) => {
                tracing::info!("Marked {} as converted to target", username);
                marked.updated += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to mark {} as converted: {:#}", username, e);
                marked.failed += 1;
            }
        }
    }
    marked.skipped = (accounts.len() as u64).saturating_sub(marked.updated + marked.failed);
    marked.log("Converted marking");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routines::DryRunSink;
    use serde_json::json;
    use sync_core::TerminatedBy;

    fn account(id: &str, fields: Value) -> AirtableRecord {
        serde_json::from_value(json!({ "id": id, "fields": fields })).unwrap()
    }

    #[tokio::test]
    async fn test_conversion_skips_existing_targets() {
        let accounts = vec![
            account("rec1", json!({ "username": "alice" })),
            account("rec2", json!({ "username": "bob" })),
            account("rec3", json!({ "full_name": "No Handle" })),
            account("rec4", json!({ "username": "bob" })),
            account("rec5", json!({ "username": "carol" })),
        ];
        let mut dedup = DedupSet::new(["alice".to_string()].into_iter().collect());
        let sink = DryRunSink::new(TARGET_BATCH_SIZE);
        let page = SinglePage::new(accounts.iter().map(|a| a.fields.clone()).collect());

        let result = SyncEngine::new(TargetMapper::new("username"), Default::default())
            .run("Network", &page, &mut dedup, None, &sink, &NullStore)
            .await
            .unwrap();

        assert_eq!(result.newly_added, 2);
        assert_eq!(result.skipped_duplicates, 2);
        assert_eq!(result.skipped_invalid, 1);
        assert_eq!(result.terminated_by, TerminatedBy::Exhausted);
        assert_eq!(sink.written(), 2);

        // Already-present and newly created targets are both marked
        let marked: Vec<&str> = converted_accounts(&accounts, "username", &dedup)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(marked, ["rec1", "rec2", "rec4", "rec5"]);
    }

    #[tokio::test]
    async fn test_target_cutoff_leaves_rest_unmarked() {
        let accounts = vec![
            account("rec1", json!({ "username": "dave" })),
            account("rec2", json!({ "username": "erin" })),
        ];
        let mut dedup = DedupSet::default();
        let page = SinglePage::new(accounts.iter().map(|a| a.fields.clone()).collect());

        SyncEngine::new(TargetMapper::new("username"), Default::default())
            .run("Network", &page, &mut dedup, Some(1), &DryRunSink::new(10), &NullStore)
            .await
            .unwrap();

        let marked: Vec<&str> = converted_accounts(&accounts, "username", &dedup)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(marked, ["rec1"]);
    }
}
