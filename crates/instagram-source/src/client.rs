//! HTTP client for the RapidAPI instagram scraper.

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use sync_core::{Cursor, Page, Record};

use crate::response::{parse_items, parse_object, parse_page};

/// Default scraper API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://instagram-scraper-api2.p.rapidapi.com";

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials and endpoint for the scraper API.
#[derive(Debug, Clone)]
pub struct RapidApiConfig {
    pub api_key: String,
    /// Value of the `x-rapidapi-host` header.
    pub host: String,
    pub endpoint: String,
}

impl RapidApiConfig {
    pub fn new(api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: host.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Strip a leading `@` and surrounding whitespace from a username.
pub fn normalize_username(username: &str) -> &str {
    username.trim().trim_start_matches('@').trim()
}

/// Client for the scraper endpoints used by the sync commands.
///
/// Requests are made once; retrying and pacing are left to
/// [`RateLimited`](sync_core::RateLimited) or the caller.
#[derive(Clone)]
pub struct RapidApiClient {
    http: Client,
    config: RapidApiConfig,
}

impl RapidApiClient {
    pub fn new(config: RapidApiConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build RapidAPI HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url> {
        let base = format!("{}/", self.config.endpoint.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|base| base.join(path.trim_start_matches('/')))
            .with_context(|| format!("Invalid RapidAPI endpoint '{}'", self.config.endpoint))
    }

    /// GET `path` with `params`; a 404 is reported as `Ok(None)`.
    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Option<Value>> {
        let url = self.endpoint_url(path)?;
        let response = self
            .http
            .get(url.clone())
            .header("x-rapidapi-key", &self.config.api_key)
            .header("x-rapidapi-host", &self.config.host)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {url}"))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} returned 404", url);
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("RapidAPI request failed with status {status} for URL: {url}: {body}");
        }

        let body = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response from: {url}"))?;
        Ok(Some(body))
    }

    async fn get_page(
        &self,
        path: &str,
        params: &[(&str, &str)],
        cursor: Option<&Cursor>,
    ) -> Result<Option<Page>> {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if let Some(cursor) = cursor {
            query.push(("pagination_token", cursor.as_str()));
        }
        Ok(self.get(path, &query).await?.and_then(parse_page))
    }

    /// One page of an account's followers.
    pub async fn followers(
        &self,
        username: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Option<Page>> {
        let username = normalize_username(username);
        self.get_page("v1/followers", &[("username_or_id_or_url", username)], cursor)
            .await
    }

    /// One page of the posts tagged with a location.
    pub async fn location_posts(
        &self,
        location_id: &str,
        cursor: Option<&Cursor>,
    ) -> Result<Option<Page>> {
        self.get_page("v1/location_posts", &[("location_id", location_id)], cursor)
            .await
    }

    /// Accounts the service considers similar to `username`.
    ///
    /// Private, new or small accounts have none; that is an empty list, not
    /// an error.
    pub async fn similar_accounts(&self, username: &str) -> Result<Vec<Record>> {
        let username = normalize_username(username);
        let body = self
            .get("v1/similar_accounts", &[("username_or_id_or_url", username)])
            .await?;
        Ok(items_of(body))
    }

    /// Profile details of one account.
    pub async fn user_info(&self, username_or_id: &str) -> Result<Option<Record>> {
        let username = normalize_username(username_or_id);
        let body = self
            .get("v1/info", &[("username_or_id_or_url", username)])
            .await?;
        Ok(body.and_then(parse_object))
    }

    /// Locations matching a free-text search.
    pub async fn search_location(&self, query: &str) -> Result<Vec<Record>> {
        let body = self
            .get("v1/search_location", &[("search_query", query)])
            .await?;
        Ok(items_of(body))
    }
}

fn items_of(body: Option<Value>) -> Vec<Record> {
    match body {
        Some(Value::Object(mut body)) => body.remove("data").map(parse_items).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(endpoint: &str) -> RapidApiClient {
        RapidApiClient::new(RapidApiConfig::new("key", "host").with_endpoint(endpoint)).unwrap()
    }

    #[test]
    fn test_endpoint_url() {
        let client = client(DEFAULT_ENDPOINT);
        assert_eq!(
            client.endpoint_url("v1/followers").unwrap().as_str(),
            "https://instagram-scraper-api2.p.rapidapi.com/v1/followers"
        );

        let client = self::client("http://localhost:3000/proxy/");
        assert_eq!(
            client.endpoint_url("/v1/info").unwrap().as_str(),
            "http://localhost:3000/proxy/v1/info"
        );
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("@alice"), "alice");
        assert_eq!(normalize_username("  @ bob "), "bob");
        assert_eq!(normalize_username("carol"), "carol");
    }

    #[test]
    fn test_items_of() {
        let body = json!({ "data": { "items": [{ "username": "dave" }] } });
        assert_eq!(items_of(Some(body)).len(), 1);
        assert!(items_of(Some(json!({ "status": "fail" }))).is_empty());
        assert!(items_of(None).is_empty());
    }
}
