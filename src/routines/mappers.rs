//! Scraper records to Airtable rows.
//!
//! Each mapper derives the dedup key from the scraped record and builds the
//! field map of the destination table. Absent optional values are left out
//! of the row, which Airtable stores as empty cells.

use airtable_client::Fields;
use chrono::DateTime;
use serde_json::Value;
use sync_core::{DedupKey, MappingError, Record, RecordMapper};

/// Profile URL of an account.
pub fn profile_url(username: &str) -> String {
    format!("https://instagram.com/{username}")
}

/// Format a unix timestamp as a `YYYY-MM-DD` UTC date.
pub fn taken_at_to_date(taken_at: i64) -> Option<String> {
    DateTime::from_timestamp(taken_at, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}

fn required_key(record: &Record, path: &str) -> Result<DedupKey, MappingError> {
    record
        .get_id(path)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| MappingError::MissingKey(path.to_string()))
}

fn copy(fields: &mut Fields, name: &str, value: Option<&Value>) {
    if let Some(value) = value {
        fields.insert(name.to_string(), value.clone());
    }
}

fn link(record_id: &str) -> Value {
    Value::Array(vec![Value::String(record_id.to_string())])
}

/// Followers of a business target into the business network table.
pub struct FollowerMapper {
    target_record_id: String,
}

impl FollowerMapper {
    pub fn new(target_record_id: impl Into<String>) -> Self {
        Self {
            target_record_id: target_record_id.into(),
        }
    }
}

impl RecordMapper for FollowerMapper {
    type Output = Fields;

    fn key(&self, record: &Record) -> Result<DedupKey, MappingError> {
        required_key(record, "username")
    }

    fn map(&self, record: &Record) -> Result<Fields, MappingError> {
        let username = self.key(record)?;
        let mut fields = Fields::new();
        fields.insert("Profile Url".to_string(), Value::String(profile_url(&username)));
        fields.insert("Username".to_string(), Value::String(username));
        copy(&mut fields, "Full Name", record.get("full_name"));
        fields.insert("Targets (Business)".to_string(), link(&self.target_record_id));
        if let Some(pk) = record.get_id("id") {
            fields.insert("Pk Id".to_string(), Value::String(pk));
        }
        copy(&mut fields, "Is Private", record.get("is_private"));
        copy(&mut fields, "Is Verified", record.get("is_verified"));
        copy(&mut fields, "Pfp Url", record.get("profile_pic_url"));
        Ok(fields)
    }
}

/// Posts of a location into the location posts table, one per author.
pub struct LocationPostMapper {
    location_record_id: String,
}

impl LocationPostMapper {
    pub fn new(location_record_id: impl Into<String>) -> Self {
        Self {
            location_record_id: location_record_id.into(),
        }
    }
}

impl RecordMapper for LocationPostMapper {
    type Output = Fields;

    fn key(&self, record: &Record) -> Result<DedupKey, MappingError> {
        required_key(record, "user.username")
    }

    fn map(&self, record: &Record) -> Result<Fields, MappingError> {
        let username = self.key(record)?;
        let post_id = record
            .get_id("id")
            .ok_or_else(|| MappingError::MissingField("id".to_string()))?;

        let mut fields = Fields::new();
        fields.insert("Post Id".to_string(), Value::String(post_id));
        fields.insert("Username".to_string(), Value::String(username));
        copy(&mut fields, "Full Name", record.get("user.full_name"));
        copy(&mut fields, "Pfp Url", record.get("user.profile_pic_url"));
        if let Some(pk) = record.get_id("user.id") {
            fields.insert("Pk Id".to_string(), Value::String(pk));
        }
        fields.insert("Locations".to_string(), link(&self.location_record_id));

        if let Some(taken_at) = record.get("taken_at") {
            let date = taken_at
                .as_i64()
                .and_then(taken_at_to_date)
                .ok_or_else(|| MappingError::InvalidField {
                    field: "taken_at".to_string(),
                    reason: format!("not a unix timestamp: {taken_at}"),
                })?;
            fields.insert("Posted Date".to_string(), Value::String(date));
        }
        copy(&mut fields, "Post Caption", record.get("caption.text"));
        Ok(fields)
    }
}

/// Location search results into the locations table.
pub struct LocationMapper {
    search_term: String,
}

impl LocationMapper {
    pub fn new(search_term: impl Into<String>) -> Self {
        Self {
            search_term: search_term.into(),
        }
    }
}

impl RecordMapper for LocationMapper {
    type Output = Fields;

    fn key(&self, record: &Record) -> Result<DedupKey, MappingError> {
        required_key(record, "id")
    }

    fn map(&self, record: &Record) -> Result<Fields, MappingError> {
        let mut fields = Fields::new();
        fields.insert("Id".to_string(), Value::String(self.key(record)?));
        copy(&mut fields, "Location Name", record.get("name"));
        fields.insert(
            "Search Term".to_string(),
            Value::String(self.search_term.clone()),
        );
        Ok(fields)
    }
}

/// Similar accounts of a target into the network table.
pub struct SimilarAccountMapper {
    target_record_id: String,
}

impl SimilarAccountMapper {
    pub fn new(target_record_id: impl Into<String>) -> Self {
        Self {
            target_record_id: target_record_id.into(),
        }
    }
}

impl RecordMapper for SimilarAccountMapper {
    type Output = Fields;

    fn key(&self, record: &Record) -> Result<DedupKey, MappingError> {
        required_key(record, "username")
    }

    fn map(&self, record: &Record) -> Result<Fields, MappingError> {
        let username = self.key(record)?;
        let mut fields = Fields::new();
        fields.insert("profile_url".to_string(), Value::String(profile_url(&username)));
        fields.insert("username".to_string(), Value::String(username));
        copy(&mut fields, "full_name", record.get("full_name"));
        if let Some(pk) = record.get_id("id") {
            fields.insert("pk_id".to_string(), Value::String(pk));
        }
        copy(&mut fields, "private", record.get("is_private"));
        copy(&mut fields, "verified", record.get("is_verified"));
        copy(&mut fields, "pfp_url", record.get("profile_pic_url"));
        fields.insert("Targets".to_string(), link(&self.target_record_id));
        Ok(fields)
    }
}

/// `Source` value of targets created from network accounts.
pub const NETWORK_CONVERSION_SOURCE: &str = "Network Conversion";

/// Network table rows into new, unprocessed targets.
pub struct TargetMapper {
    username_field: String,
}

impl TargetMapper {
    pub fn new(username_field: impl Into<String>) -> Self {
        Self {
            username_field: username_field.into(),
        }
    }
}

impl RecordMapper for TargetMapper {
    type Output = Fields;

    fn key(&self, record: &Record) -> Result<DedupKey, MappingError> {
        required_key(record, &self.username_field)
    }

    fn map(&self, record: &Record) -> Result<Fields, MappingError> {
        let mut fields = Fields::new();
        fields.insert("username".to_string(), Value::String(self.key(record)?));
        fields.insert("Processed".to_string(), Value::Bool(false));
        fields.insert(
            "Source".to_string(),
            Value::String(NETWORK_CONVERSION_SOURCE.to_string()),
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[test]
    fn test_taken_at_to_date() {
        assert_eq!(taken_at_to_date(0).as_deref(), Some("1970-01-01"));
        // 23:59:59 UTC stays on the same day regardless of local time zone
        assert_eq!(taken_at_to_date(1_718_409_599).as_deref(), Some("2024-06-14"));
        assert_eq!(taken_at_to_date(1_718_409_600).as_deref(), Some("2024-06-15"));
    }

    #[test]
    fn test_follower_mapping() {
        let follower = record(json!({
            "id": 5512,
            "username": "bob",
            "full_name": "Bob B",
            "is_private": false,
            "is_verified": true,
            "profile_pic_url": "https://cdn.example/bob.jpg"
        }));
        let mapper = FollowerMapper::new("recTarget1");

        assert_eq!(mapper.key(&follower).unwrap(), "bob");
        assert_eq!(
            Value::Object(mapper.map(&follower).unwrap()),
            json!({
                "Username": "bob",
                "Full Name": "Bob B",
                "Profile Url": "https://instagram.com/bob",
                "Targets (Business)": ["recTarget1"],
                "Pk Id": "5512",
                "Is Private": false,
                "Is Verified": true,
                "Pfp Url": "https://cdn.example/bob.jpg"
            })
        );
    }

    #[test]
    fn test_follower_without_username() {
        let mapper = FollowerMapper::new("recTarget1");
        assert_eq!(
            mapper.key(&record(json!({ "id": 1, "username": "" }))),
            Err(MappingError::MissingKey("username".to_string()))
        );
        assert!(mapper.key(&record(json!({ "id": 1 }))).is_err());
    }

    #[test]
    fn test_location_post_mapping() {
        let post = record(json!({
            "id": "3391_77",
            "taken_at": 1_718_409_600,
            "caption": { "text": "Sunset at the beach" },
            "user": {
                "id": "77",
                "username": "carol",
                "full_name": "Carol C",
                "profile_pic_url": "https://cdn.example/carol.jpg"
            }
        }));
        let mapper = LocationPostMapper::new("recLoc9");

        assert_eq!(mapper.key(&post).unwrap(), "carol");
        assert_eq!(
            Value::Object(mapper.map(&post).unwrap()),
            json!({
                "Post Id": "3391_77",
                "Username": "carol",
                "Full Name": "Carol C",
                "Pfp Url": "https://cdn.example/carol.jpg",
                "Pk Id": "77",
                "Locations": ["recLoc9"],
                "Posted Date": "2024-06-15",
                "Post Caption": "Sunset at the beach"
            })
        );
    }

    #[test]
    fn test_location_post_without_caption() {
        let post = record(json!({
            "id": "1",
            "caption": null,
            "user": { "username": "dave" }
        }));
        let fields = LocationPostMapper::new("recLoc9").map(&post).unwrap();
        assert!(!fields.contains_key("Post Caption"));
        assert!(!fields.contains_key("Posted Date"));
    }

    #[test]
    fn test_location_post_invalid_timestamp() {
        let post = record(json!({
            "id": "1",
            "taken_at": "yesterday",
            "user": { "username": "erin" }
        }));
        let err = LocationPostMapper::new("recLoc9").map(&post).unwrap_err();
        assert!(matches!(err, MappingError::InvalidField { field, .. } if field == "taken_at"));
    }

    #[test]
    fn test_location_mapping() {
        let location = record(json!({ "id": 212988663, "name": "Bali, Indonesia" }));
        let mapper = LocationMapper::new("Bali");

        assert_eq!(mapper.key(&location).unwrap(), "212988663");
        assert_eq!(
            Value::Object(mapper.map(&location).unwrap()),
            json!({
                "Id": "212988663",
                "Location Name": "Bali, Indonesia",
                "Search Term": "Bali"
            })
        );
    }

    #[test]
    fn test_similar_account_mapping() {
        let account = record(json!({
            "id": "42",
            "username": "frank",
            "full_name": "Frank F",
            "is_private": true,
            "is_verified": false,
            "profile_pic_url": "https://cdn.example/frank.jpg"
        }));
        let fields = SimilarAccountMapper::new("recT2").map(&account).unwrap();

        assert_eq!(fields["username"], json!("frank"));
        assert_eq!(fields["profile_url"], json!("https://instagram.com/frank"));
        assert_eq!(fields["pk_id"], json!("42"));
        assert_eq!(fields["private"], json!(true));
        assert_eq!(fields["Targets"], json!(["recT2"]));
    }

    #[test]
    fn test_target_mapping() {
        let row = record(json!({
            "username": "gina",
            "full_name": "Gina G",
            "Follower Count": 5400
        }));
        let mapper = TargetMapper::new("username");

        assert_eq!(mapper.key(&row).unwrap(), "gina");
        assert_eq!(
            Value::Object(mapper.map(&row).unwrap()),
            json!({
                "username": "gina",
                "Processed": false,
                "Source": "Network Conversion"
            })
        );
        assert!(mapper.key(&record(json!({ "full_name": "Nobody" }))).is_err());
    }
}
