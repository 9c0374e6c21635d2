//! Error taxonomy of a sync run.
//!
//! Collaborators (sources, sinks, cursor stores) report failures as
//! `anyhow::Error`. The engine classifies them into [`SyncError`] when a run
//! has to stop, and into [`MappingError`] for single records it skips.
//! Fetch failures never surface here: they end the run with
//! [`TerminatedBy::Error`](crate::TerminatedBy::Error) and a partial result.

/// Fatal errors that abort a sync run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The sink rejected a batch. Batches flushed before it stay committed.
    #[error(
        "Failed to write batch of {batch_len} records for '{entity}' \
         ({committed} records already committed): {reason}"
    )]
    Write {
        entity: String,
        batch_len: usize,
        committed: u64,
        reason: String,
    },

    /// The cursor store failed while strict cursor handling is enabled.
    #[error("Failed to persist cursor for '{entity}': {reason}")]
    CursorPersist { entity: String, reason: String },
}

/// A single record could not be turned into a destination record.
///
/// The record is skipped and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    /// The field the dedup key is derived from is absent
    #[error("Missing dedup key field '{0}'")]
    MissingKey(String),

    /// A field required by the destination schema is absent
    #[error("Missing required field '{0}'")]
    MissingField(String),

    /// A field is present but cannot be converted
    #[error("Invalid value for field '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}
