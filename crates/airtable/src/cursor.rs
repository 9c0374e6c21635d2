//! Cursor storage on the entity's own Airtable record.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sync_core::{cursor_preview, Cursor, CursorStore};

use crate::client::AirtableClient;
use crate::types::Fields;

/// Field holding the resume token of a business target.
pub const DEFAULT_CURSOR_FIELD: &str = "Last Pagination Token";

/// Checkbox set once a target's followers have been fully scraped.
pub const DEFAULT_DONE_FIELD: &str = "Network Scraped";

/// Keeps each entity's cursor in a field of the entity's record.
///
/// The entity name passed by the engine is the Airtable record id. Saving
/// `None` empties the field; finishing the entity ticks the done checkbox,
/// which takes the record out of the next run's target list.
pub struct RecordFieldCursorStore {
    client: AirtableClient,
    table: String,
    cursor_field: String,
    done_field: String,
}

impl RecordFieldCursorStore {
    pub fn new(client: AirtableClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            cursor_field: DEFAULT_CURSOR_FIELD.to_string(),
            done_field: DEFAULT_DONE_FIELD.to_string(),
        }
    }

    pub fn with_fields(
        mut self,
        cursor_field: impl Into<String>,
        done_field: impl Into<String>,
    ) -> Self {
        self.cursor_field = cursor_field.into();
        self.done_field = done_field.into();
        self
    }

    fn cursor_update(&self, cursor: Option<&Cursor>) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            self.cursor_field.clone(),
            cursor.map_or(Value::Null, |c| Value::String(c.clone())),
        );
        fields
    }

    fn done_update(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(self.done_field.clone(), Value::Bool(true));
        fields
    }
}

#[async_trait]
impl CursorStore for RecordFieldCursorStore {
    async fn load(&self, entity: &str) -> Result<Option<Cursor>> {
        let record = self.client.get_record(&self.table, entity).await?;
        Ok(record
            .fields
            .get_str(&self.cursor_field)
            .filter(|c| !c.is_empty())
            .map(str::to_string))
    }

    async fn save(&self, entity: &str, cursor: Option<&Cursor>) -> Result<()> {
        self.client
            .update_record(&self.table, entity, &self.cursor_update(cursor))
            .await?;
        if let Some(cursor) = cursor {
            tracing::debug!("Saved pagination token {}", cursor_preview(cursor));
        }
        Ok(())
    }

    async fn clear(&self, entity: &str) -> Result<()> {
        self.client
            .update_record(&self.table, entity, &self.cursor_update(None))
            .await?;
        Ok(())
    }

    async fn mark_fully_synced(&self, entity: &str, _added: u64) -> Result<()> {
        self.client
            .update_record(&self.table, entity, &self.done_update())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AirtableConfig;
    use serde_json::json;

    fn store() -> RecordFieldCursorStore {
        let client = AirtableClient::new(AirtableConfig::new("key", "appXYZ")).unwrap();
        RecordFieldCursorStore::new(client, "Business Targets")
    }

    #[test]
    fn test_cursor_update_payloads() {
        let store = store();
        assert_eq!(
            Value::Object(store.cursor_update(Some(&"tok1".to_string()))),
            json!({ "Last Pagination Token": "tok1" })
        );
        assert_eq!(
            Value::Object(store.cursor_update(None)),
            json!({ "Last Pagination Token": null })
        );
        assert_eq!(
            Value::Object(store.done_update()),
            json!({ "Network Scraped": true })
        );
    }

    #[test]
    fn test_custom_fields() {
        let store = store().with_fields("Resume Token", "Done");
        assert_eq!(
            Value::Object(store.cursor_update(None)),
            json!({ "Resume Token": null })
        );
        assert_eq!(Value::Object(store.done_update()), json!({ "Done": true }));
    }
}
