//! Airtable REST client.

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use sync_core::RetryPolicy;

use crate::types::{
    AirtableRecord, CreateRequest, CreateResponse, Fields, ListQuery, ListResponse, NewRecord,
    UpdateRequest,
};

/// Default Airtable API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.airtable.com";

/// Maximum number of records Airtable accepts in one create request.
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for one Airtable base.
#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_key: String,
    pub base_id: String,
    pub endpoint: String,
}

impl AirtableConfig {
    pub fn new(api_key: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_id: base_id.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Client for the tables of one Airtable base.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct AirtableClient {
    http: Client,
    config: AirtableConfig,
    retry: RetryPolicy,
}

impl AirtableClient {
    pub fn new(config: AirtableConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build Airtable HTTP client")?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::default(),
        })
    }

    /// Replace the retry policy used for reads and updates.
    ///
    /// Record creation is never retried: a timed out request may still have
    /// created its records.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_id(&self) -> &str {
        &self.config.base_id
    }

    /// URL of `table`, or of one of its records when `record_id` is given.
    ///
    /// Table names are percent-encoded, so names with spaces or emoji work.
    pub fn table_url(&self, table: &str, record_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint)
            .with_context(|| format!("Invalid Airtable endpoint '{}'", self.config.endpoint))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Airtable endpoint cannot be a base URL"))?;
            segments.pop_if_empty();
            segments.extend(["v0", self.config.base_id.as_str(), table]);
            if let Some(id) = record_id {
                segments.push(id);
            }
        }
        Ok(url)
    }

    /// Fetch a single page of `table`.
    pub async fn list_page(
        &self,
        table: &str,
        query: &ListQuery,
        offset: Option<&str>,
    ) -> Result<ListResponse> {
        let url = self.table_url(table, None)?;
        let mut params = query.params();
        if let Some(offset) = offset {
            params.push(("offset", offset.to_string()));
        }

        let response = self
            .http
            .get(url.clone())
            .bearer_auth(&self.config.api_key)
            .query(&params)
            .send()
            .await
            .with_context(|| format!("Failed to list records of table '{table}'"))?;
        parse_json(response, &url).await
    }

    /// Fetch every record of `table` matching `query`, following offsets.
    pub async fn list_all(&self, table: &str, query: &ListQuery) -> Result<Vec<AirtableRecord>> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let page = self
                .retry
                .run("Listing Airtable records", || {
                    self.list_page(table, query, offset.as_deref())
                })
                .await?;
            pages += 1;
            records.extend(page.records);

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        tracing::debug!(
            "Listed {} records from table '{}' in {} pages",
            records.len(),
            table,
            pages
        );
        Ok(records)
    }

    /// Collect the non-empty string values of `field` across the whole table.
    ///
    /// This is the global existing-key set used for deduplication. Numeric
    /// values are included in their string form.
    pub async fn existing_keys(&self, table: &str, field: &str) -> Result<HashSet<String>> {
        let query = ListQuery::new().field(field);
        let records = self.list_all(table, &query).await?;
        let keys = collect_keys(&records, field);
        tracing::info!(
            "Found {} existing unique values of '{}' in table '{}'",
            keys.len(),
            field,
            table
        );
        Ok(keys)
    }

    /// Create records in `table`, sending at most ten per request.
    ///
    /// Chunks are sent in order. If a chunk fails, the chunks before it stay
    /// created and the error reports how many records were committed.
    pub async fn create_records(&self, table: &str, records: &[Fields]) -> Result<usize> {
        let url = self.table_url(table, None)?;
        let mut created = 0usize;

        for chunk in records.chunks(MAX_RECORDS_PER_REQUEST) {
            let body = CreateRequest {
                records: chunk.iter().map(|fields| NewRecord { fields }).collect(),
            };
            let result: Result<CreateResponse> = async {
                let response = self
                    .http
                    .post(url.clone())
                    .bearer_auth(&self.config.api_key)
                    .json(&body)
                    .send()
                    .await
                    .with_context(|| format!("Failed to send records to table '{table}'"))?;
                parse_json(response, &url).await
            }
            .await;

            let response = result.with_context(|| {
                format!(
                    "Failed to create {} records in table '{}' ({} already created)",
                    chunk.len(),
                    table,
                    created
                )
            })?;
            created += response.records.len();
            tracing::debug!(
                "Created batch of {} records in table '{}'",
                chunk.len(),
                table
            );
        }

        Ok(created)
    }

    /// Fetch one record by id.
    pub async fn get_record(&self, table: &str, record_id: &str) -> Result<AirtableRecord> {
        let url = &self.table_url(table, Some(record_id))?;
        self.retry
            .run("Fetching Airtable record", move || async move {
                let response = self
                    .http
                    .get(url.clone())
                    .bearer_auth(&self.config.api_key)
                    .send()
                    .await
                    .with_context(|| format!("Failed to fetch record {record_id}"))?;
                parse_json(response, url).await
            })
            .await
    }

    /// Patch the given fields of one record, leaving other fields untouched.
    ///
    /// A `null` value empties the cell.
    pub async fn update_record(
        &self,
        table: &str,
        record_id: &str,
        fields: &Fields,
    ) -> Result<AirtableRecord> {
        let url = &self.table_url(table, Some(record_id))?;
        let body = &UpdateRequest { fields };
        self.retry
            .run("Updating Airtable record", move || async move {
                let response = self
                    .http
                    .patch(url.clone())
                    .bearer_auth(&self.config.api_key)
                    .json(body)
                    .send()
                    .await
                    .with_context(|| format!("Failed to update record {record_id}"))?;
                parse_json(response, url).await
            })
            .await
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Airtable request failed with status {status} for URL: {url}: {body}");
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse Airtable response from: {url}"))
}

pub(crate) fn collect_keys(records: &[AirtableRecord], field: &str) -> HashSet<String> {
    records
        .iter()
        .filter_map(|record| record.fields.get_id(field))
        .filter(|key| !key.is_empty())
        .collect()
}
