//! Batched record creation as an engine [`Sink`].

use anyhow::Result;
use async_trait::async_trait;
use sync_core::Sink;

use crate::client::{AirtableClient, MAX_RECORDS_PER_REQUEST};
use crate::types::Fields;

/// Writes engine batches into one Airtable table.
///
/// Batches may be larger than Airtable's per-request limit; they are split
/// into sequential create requests by [`AirtableClient::create_records`].
pub struct AirtableSink {
    client: AirtableClient,
    table: String,
    max_batch_size: usize,
}

impl AirtableSink {
    /// Sink whose batches match one create request.
    pub fn new(client: AirtableClient, table: impl Into<String>) -> Self {
        Self::with_max_batch_size(client, table, MAX_RECORDS_PER_REQUEST)
    }

    pub fn with_max_batch_size(
        client: AirtableClient,
        table: impl Into<String>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            client,
            table: table.into(),
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl Sink<Fields> for AirtableSink {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn write_batch(&self, batch: &[Fields]) -> Result<()> {
        let created = self.client.create_records(&self.table, batch).await?;
        tracing::debug!("Created {} records in table '{}'", created, self.table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AirtableConfig;

    fn client() -> AirtableClient {
        AirtableClient::new(AirtableConfig::new("key", "appXYZ")).unwrap()
    }

    #[test]
    fn test_default_batch_matches_request_limit() {
        let sink = AirtableSink::new(client(), "Location Posts");
        assert_eq!(sink.max_batch_size(), 10);
        assert_eq!(sink.table(), "Location Posts");
    }

    #[test]
    fn test_configured_batch_size() {
        assert_eq!(
            AirtableSink::with_max_batch_size(client(), "Business Network", 100).max_batch_size(),
            100
        );
        assert_eq!(
            AirtableSink::with_max_batch_size(client(), "Business Network", 0).max_batch_size(),
            1
        );
    }
}
