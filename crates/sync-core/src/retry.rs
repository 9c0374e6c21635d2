//! Rate limiting and retry policy for remote API calls.
//!
//! The scraper and spreadsheet APIs both throttle aggressive clients, so
//! every paged read waits a fixed delay between pages and retries failed
//! requests a bounded number of times.

use std::future::Future;
use std::time::Duration;

/// Default pause between consecutive page requests.
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(250);
/// Default pause before retrying a failed request.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);
/// Default number of retries after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// How long to wait before each retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `base`, `2 * base`, `4 * base`, ... capped at `max`.
    Exponential { base: Duration, max: Duration },
}

/// Inter-request delay plus bounded retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before every request that continues a pagination sequence
    pub request_delay: Duration,
    /// Retries after the first failed attempt; 0 disables retrying
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: Backoff::Fixed(DEFAULT_RETRY_DELAY),
        }
    }
}

impl RetryPolicy {
    /// No delay and no retries.
    pub fn none() -> Self {
        Self {
            request_delay: Duration::ZERO,
            max_retries: 0,
            backoff: Backoff::Fixed(Duration::ZERO),
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1).min(16);
                base.checked_mul(1u32 << exponent)
                    .unwrap_or(max)
                    .min(max)
            }
        }
    }

    /// Run `op`, retrying failures according to this policy.
    ///
    /// `what` names the operation in log output. The last error is returned
    /// once retries are exhausted.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::info!("{what} succeeded after {attempt} retries");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(e.context(format!("{what} failed after {attempt} attempts")));
                    }
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}): {:#}. Retrying in {:?}...",
                        what,
                        attempt,
                        self.max_retries + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
