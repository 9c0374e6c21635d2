//! Instagram data through the RapidAPI `instagram-scraper-api2` service.
//!
//! [`RapidApiClient`] wraps the endpoints the sync commands use. The
//! paginated ones are exposed to the engine as [`PagedSource`](sync_core::PagedSource)
//! implementations:
//!
//! - [`FollowersSource`] - followers of one account
//! - [`LocationPostsSource`] - recent posts tagged with one location
//!
//! Single-response lookups (similar accounts, location search) return plain
//! record lists that callers wrap in [`SinglePage`](sync_core::SinglePage).

mod client;
mod response;
mod sources;

pub use client::{normalize_username, RapidApiClient, RapidApiConfig, DEFAULT_ENDPOINT};
pub use response::{parse_items, parse_object, parse_page};
pub use sources::{FollowersSource, LocationPostsSource};
