//! Response envelopes of the scraper API.
//!
//! List endpoints answer `{"data": {"items": [...]}, "pagination_token": ".."}`
//! and detail endpoints answer `{"data": {...}}`. A body without `data` means
//! the API had nothing for the request.

use serde_json::Value;
use sync_core::{Page, Record};

/// Parse a list response into a page.
///
/// Returns `None` when the body carries no `data` object. An empty or
/// missing `pagination_token` marks the last page. Items that are not JSON
/// objects are dropped.
pub fn parse_page(body: Value) -> Option<Page> {
    let Value::Object(mut body) = body else {
        return None;
    };
    let next = match body.remove("pagination_token") {
        Some(Value::String(token)) if !token.is_empty() => Some(token),
        _ => None,
    };
    let data = body.remove("data")?;
    if !data.is_object() {
        return None;
    }
    Some(Page::new(parse_items(data), next))
}

/// Extract the records of `data.items`.
pub fn parse_items(data: Value) -> Vec<Record> {
    let Value::Object(mut data) = data else {
        return Vec::new();
    };
    match data.remove("items") {
        Some(Value::Array(items)) => items.into_iter().filter_map(Record::from_value).collect(),
        _ => Vec::new(),
    }
}

/// Extract the `data` object of a detail response.
pub fn parse_object(body: Value) -> Option<Record> {
    let Value::Object(mut body) = body else {
        return None;
    };
    body.remove("data").and_then(Record::from_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_followers_page() {
        let body = json!({
            "data": {
                "count": 2,
                "items": [
                    { "id": "101", "username": "alice", "is_private": false },
                    { "id": "102", "username": "bob", "is_private": true }
                ]
            },
            "pagination_token": "QVFCa2Rq"
        });

        let page = parse_page(body).unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[1].get_str("username"), Some("bob"));
        assert_eq!(page.next_cursor.as_deref(), Some("QVFCa2Rq"));
    }

    #[test]
    fn test_last_page_has_no_token() {
        let page = parse_page(json!({ "data": { "items": [] }, "pagination_token": "" })).unwrap();
        assert!(page.records.is_empty());
        assert!(page.next_cursor.is_none());

        let page = parse_page(json!({ "data": { "items": [{ "id": 1 }] } })).unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.next_cursor.is_none());

        let page =
            parse_page(json!({ "data": { "items": [] }, "pagination_token": null })).unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_missing_data_is_no_page() {
        assert!(parse_page(json!({ "detail": "Not found" })).is_none());
        assert!(parse_page(json!({ "data": null })).is_none());
        assert!(parse_page(json!([1, 2])).is_none());
    }

    #[test]
    fn test_non_object_items_are_dropped() {
        let records = parse_items(json!({ "items": [{ "id": 1 }, "junk", 3, null] }));
        assert_eq!(records.len(), 1);
        assert!(parse_items(json!({ "items": "none" })).is_empty());
    }

    #[test]
    fn test_parse_user_info() {
        let body = json!({
            "data": {
                "username": "carol",
                "biography": "Coffee and code",
                "follower_count": 1520
            }
        });
        let info = parse_object(body).unwrap();
        assert_eq!(info.get_i64("follower_count"), Some(1520));
        assert!(parse_object(json!({ "message": "error" })).is_none());
    }
}
