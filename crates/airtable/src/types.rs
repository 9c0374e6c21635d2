//! Airtable REST payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sync_core::Record;

/// Field map of one Airtable record, as sent on create and update.
pub type Fields = Map<String, Value>;

/// A record returned by the Airtable API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AirtableRecord {
    pub id: String,
    #[serde(rename = "createdTime", default)]
    pub created_time: Option<String>,
    /// Airtable omits empty cells, so a missing field and a blank one read
    /// the same.
    #[serde(default)]
    pub fields: Record,
}

/// One page of a list request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub records: Vec<AirtableRecord>,
    /// Present while more pages follow.
    #[serde(default)]
    pub offset: Option<String>,
}

/// Filters for a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Name or id of a view whose filters and sort order apply.
    pub view: Option<String>,
    /// Airtable formula, e.g. `{Network Scraped} != TRUE()`.
    pub filter_by_formula: Option<String>,
    /// Only return these fields.
    pub fields: Vec<String>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(mut self, view: impl Into<String>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Like [`view`](Self::view), ignoring `None` and empty names.
    pub fn maybe_view(mut self, view: Option<&str>) -> Self {
        self.view = view.filter(|v| !v.is_empty()).map(str::to_string);
        self
    }

    pub fn filter(mut self, formula: impl Into<String>) -> Self {
        self.filter_by_formula = Some(formula.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Query string pairs, without the pagination offset.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(view) = &self.view {
            params.push(("view", view.clone()));
        }
        if let Some(formula) = &self.filter_by_formula {
            params.push(("filterByFormula", formula.clone()));
        }
        for field in &self.fields {
            params.push(("fields[]", field.clone()));
        }
        params
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewRecord<'a> {
    pub fields: &'a Fields,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest<'a> {
    pub records: Vec<NewRecord<'a>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    #[serde(default)]
    pub records: Vec<AirtableRecord>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRequest<'a> {
    pub fields: &'a Fields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_list_response_with_offset() {
        let body = json!({
            "records": [
                {
                    "id": "rec1",
                    "createdTime": "2024-05-01T10:00:00.000Z",
                    "fields": { "Username": "alice", "Network Scraped": true }
                },
                { "id": "rec2", "createdTime": "2024-05-01T10:00:01.000Z", "fields": {} }
            ],
            "offset": "itrABC/rec2"
        });

        let page: ListResponse = serde_json::from_value(body).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, "rec1");
        assert_eq!(page.records[0].fields.get_str("Username"), Some("alice"));
        assert_eq!(page.records[0].fields.get_bool("Network Scraped"), Some(true));
        assert!(page.records[1].fields.fields().is_empty());
        assert_eq!(page.offset.as_deref(), Some("itrABC/rec2"));
    }

    #[test]
    fn test_parse_last_list_page() {
        let page: ListResponse = serde_json::from_value(json!({ "records": [] })).unwrap();
        assert!(page.records.is_empty());
        assert!(page.offset.is_none());
    }

    #[test]
    fn test_record_without_fields() {
        let record: AirtableRecord = serde_json::from_value(json!({ "id": "rec9" })).unwrap();
        assert_eq!(record.id, "rec9");
        assert!(record.created_time.is_none());
        assert!(record.fields.get("Username").is_none());
    }

    #[test]
    fn test_list_query_params() {
        let query = ListQuery::new()
            .view("🔥 Locations")
            .filter("{Gender Checked} != TRUE()")
            .field("Username")
            .field("Pfp Url");

        assert_eq!(
            query.params(),
            vec![
                ("view", "🔥 Locations".to_string()),
                ("filterByFormula", "{Gender Checked} != TRUE()".to_string()),
                ("fields[]", "Username".to_string()),
                ("fields[]", "Pfp Url".to_string()),
            ]
        );
        assert!(ListQuery::new().maybe_view(Some("")).params().is_empty());
    }

    #[test]
    fn test_create_request_shape() {
        let mut fields = Fields::new();
        fields.insert("Username".to_string(), json!("bob"));
        let request = CreateRequest {
            records: vec![NewRecord { fields: &fields }],
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "records": [{ "fields": { "Username": "bob" } }] })
        );
    }
}
