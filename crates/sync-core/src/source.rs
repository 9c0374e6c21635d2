//! Generic [`PagedSource`] adapters.

use anyhow::Result;
use async_trait::async_trait;

use crate::retry::RetryPolicy;
use crate::traits::PagedSource;
use crate::types::{Cursor, Page, Record};

/// Wraps a source with a [`RetryPolicy`].
///
/// Every request that continues a pagination sequence (i.e. carries a
/// cursor) is preceded by the policy's request delay. Failed fetches are
/// retried with the policy's backoff; once retries are exhausted the error
/// is handed to the engine, which ends the run.
pub struct RateLimited<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RateLimited<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: PagedSource> PagedSource for RateLimited<S> {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<Option<Page>> {
        if cursor.is_some() && !self.policy.request_delay.is_zero() {
            tokio::time::sleep(self.policy.request_delay).await;
        }
        let inner = &self.inner;
        self.policy
            .run("Fetching page", move || inner.fetch(cursor))
            .await
    }
}

/// A collection that arrives in one response, exposed as a single page.
///
/// Lets non-paginated lookups (similar accounts, location search) go through
/// the same dedup and batching path as paginated ones.
#[derive(Debug, Clone, Default)]
pub struct SinglePage {
    records: Vec<Record>,
}

impl SinglePage {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl PagedSource for SinglePage {
    async fn fetch(&self, _cursor: Option<&Cursor>) -> Result<Option<Page>> {
        Ok(Some(Page::last(self.records.clone())))
    }
}
