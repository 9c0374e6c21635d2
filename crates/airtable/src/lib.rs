//! Airtable as a sync destination.
//!
//! - [`AirtableClient`] - paged listing, batched creation, record get/patch
//! - [`AirtableSink`] - engine [`Sink`](sync_core::Sink) over one table
//! - [`RecordFieldCursorStore`] - resume cursor stored on the entity's record
//!
//! The existing-key set for deduplication comes from
//! [`AirtableClient::existing_keys`], a full scan of the destination table.

pub mod client;
pub mod cursor;
pub mod sink;
pub mod types;

pub use client::{AirtableClient, AirtableConfig, DEFAULT_ENDPOINT, MAX_RECORDS_PER_REQUEST};
pub use cursor::RecordFieldCursorStore;
pub use sink::AirtableSink;
pub use types::{AirtableRecord, Fields, ListQuery, ListResponse};
