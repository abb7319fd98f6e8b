//! Error types for rostersync-sync.
//!
//! Batch runs never return these for a single bad entry; per-entry failures
//! are recorded in the report. These cover the single-target operations.

use thiserror::Error;

use rostersync_client::ClientError;
use rostersync_core::error::RosterError;

use crate::report::Stage;

/// Errors from single-identity operations (`inspect`, `remove`).
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the roster layer.
    #[error("roster error: {0}")]
    Roster(#[from] RosterError),

    /// A call into the service failed.
    #[error("service call failed: {0}")]
    Client(#[from] ClientError),

    /// No identity matches the requested email.
    #[error("no identity registered for {email}")]
    IdentityNotFound { email: String },
}

/// A service call that failed at a known step of the per-entry flow.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: ClientError,
}

impl StageError {
    pub fn new(stage: Stage, source: ClientError) -> Self {
        Self { stage, source }
    }

    /// Adapter for `map_err`.
    pub fn at(stage: Stage) -> impl FnOnce(ClientError) -> Self {
        move |source| Self::new(stage, source)
    }
}
