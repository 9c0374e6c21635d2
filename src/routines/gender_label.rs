//! Gender labels from profile pictures for unchecked records.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

use airtable_client::{Fields, ListQuery};

use super::EnrichSummary;
use crate::gender::{Detection, PicPurifyClient, DEFAULT_PICPURIFY_ENDPOINT};
use crate::{AirtableOpts, SyncOpts};

/// Records without a gender check yet.
pub const UNCHECKED_FORMULA: &str = "{Gender Checked} != TRUE()";

/// Which table to label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum GenderTable {
    /// Followers of business targets
    BusinessNetwork,
    /// Authors of location posts
    LocationPosts,
}

#[derive(Parser, Clone, Debug)]
pub struct GenderLabelArgs {
    /// Table to label
    #[arg(long, value_enum, default_value = "business-network")]
    pub table: GenderTable,

    /// Business network table name
    #[arg(long, env = "AIRTABLE_BUSINESS_NETWORK_TABLE")]
    pub network_table: Option<String>,

    /// Location posts table name
    #[arg(long, env = "AIRTABLE_LOCATION_POSTS_TABLE")]
    pub posts_table: Option<String>,

    /// PicPurify API key
    #[arg(long, env = "PICPURIFY_API_KEY", hide_env_values = true)]
    pub picpurify_api_key: String,

    /// PicPurify analysis endpoint
    #[arg(long, default_value = DEFAULT_PICPURIFY_ENDPOINT, env = "PICPURIFY_ENDPOINT")]
    pub picpurify_endpoint: String,

    #[command(flatten)]
    pub airtable: AirtableOpts,

    #[command(flatten)]
    pub sync: SyncOpts,
}

impl GenderLabelArgs {
    /// Name of the selected table.
    pub fn table_name(&self) -> Result<&str> {
        let (name, flag) = match self.table {
            GenderTable::BusinessNetwork => (&self.network_table, "--network-table"),
            GenderTable::LocationPosts => (&self.posts_table, "--posts-table"),
        };
        name.as_deref()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow::anyhow!("{flag} is required to label {:?}", self.table))
    }
}

/// Fields written for a detection result.
pub fn gender_update(detection: &Detection) -> Fields {
    let mut fields = Fields::new();
    match detection {
        Detection::Face(prediction) => {
            fields.insert("Gender".to_string(), Value::String(prediction.label.clone()));
            fields.insert("Gender Confidence".to_string(), json!(prediction.confidence));
        }
        Detection::NoFace => {
            fields.insert("No Face Detected".to_string(), Value::Bool(true));
        }
    }
    fields.insert("Gender Checked".to_string(), Value::Bool(true));
    fields
}

pub async fn run(args: GenderLabelArgs) -> Result<()> {
    let table = args.table_name()?.to_string();
    let retry = args.sync.retry_policy();
    let airtable = args.airtable.client(retry.clone())?;
    let picpurify = PicPurifyClient::new(&args.picpurify_api_key, &args.picpurify_endpoint)?;

    let query = ListQuery::new().filter(UNCHECKED_FORMULA);
    let records = airtable.list_all(&table, &query).await?;
    if records.is_empty() {
        tracing::info!("No records in '{}' need a gender check", table);
        return Ok(());
    }
    tracing::info!("Found {} records in '{}' needing gender check", records.len(), table);

    let mut summary = EnrichSummary::default();
    for record in &records {
        if summary.target_reached(args.sync.target) {
            tracing::info!("Reached target of {} processed records", summary.processed());
            break;
        }
        let username = record.fields.get_str("Username").unwrap_or(record.id.as_str());
        let Some(pfp_url) = record.fields.get_str("Pfp Url") else {
            tracing::info!("No profile picture URL for {}, skipping", username);
            summary.skipped += 1;
            continue;
        };

        // Unreachable service: leave the record unchecked for the next run
        let detection = match retry
            .run("Detecting gender", || picpurify.detect(pfp_url))
            .await
        {
            Ok(detection) => detection,
            Err(e) => {
                tracing::warn!("Gender detection failed for {}: {:#}", username, e);
                summary.failed += 1;
                continue;
            }
        };

        let update = gender_update(&detection);
        if args.sync.dry_run {
            tracing::info!("[dry-run] would update {}: {}", username, serde_json::Value::Object(update));
            summary.updated += 1;
            continue;
        }
        match airtable.update_record(&table, &record.id, &update).await {
            Ok(_) => {
                if let Detection::Face(prediction) = &detection {
                    tracing::info!("Updated gender for {}: {}", username, prediction.label);
                } else {
                    tracing::info!("Marked {} as checked - no faces detected", username);
                }
                summary.updated += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to update gender for {}: {:#}", username, e);
                summary.failed += 1;
            }
        }
    }

    summary.log("Gender labelling");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gender::GenderPrediction;

    #[test]
    fn test_gender_update_for_face() {
        let detection = Detection::Face(GenderPrediction {
            label: "Female".to_string(),
            confidence: Some(0.91),
        });
        assert_eq!(
            Value::Object(gender_update(&detection)),
            json!({ "Gender": "Female", "Gender Confidence": 0.91, "Gender Checked": true })
        );
    }

    #[test]
    fn test_gender_update_without_face() {
        assert_eq!(
            Value::Object(gender_update(&Detection::NoFace)),
            json!({ "Gender Checked": true, "No Face Detected": true })
        );
    }
}
