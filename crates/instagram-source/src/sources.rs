//! [`PagedSource`] adapters over [`RapidApiClient`].

use anyhow::Result;
use async_trait::async_trait;
use sync_core::{Cursor, Page, PagedSource};

use crate::client::RapidApiClient;

/// Followers of one account, paged by the scraper's pagination token.
pub struct FollowersSource {
    client: RapidApiClient,
    username: String,
}

impl FollowersSource {
    pub fn new(client: RapidApiClient, username: impl Into<String>) -> Self {
        Self {
            client,
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

#[async_trait]
impl PagedSource for FollowersSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Option<Page>> {
        let page = self.client.followers(&self.username, cursor).await?;
        if let Some(page) = &page {
            tracing::debug!(
                "Fetched {} followers of {}",
                page.records.len(),
                self.username
            );
        }
        Ok(page)
    }
}

/// Posts tagged with one location, newest first.
pub struct LocationPostsSource {
    client: RapidApiClient,
    location_id: String,
}

impl LocationPostsSource {
    pub fn new(client: RapidApiClient, location_id: impl Into<String>) -> Self {
        Self {
            client,
            location_id: location_id.into(),
        }
    }

    pub fn location_id(&self) -> &str {
        &self.location_id
    }
}

#[async_trait]
impl PagedSource for LocationPostsSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Option<Page>> {
        let page = self.client.location_posts(&self.location_id, cursor).await?;
        if let Some(page) = &page {
            tracing::debug!(
                "Fetched {} posts for location {}",
                page.records.len(),
                self.location_id
            );
        }
        Ok(page)
    }
}
