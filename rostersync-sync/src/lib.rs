//! # rostersync-sync
//!
//! Identity resolution, profile reconciliation, and the run pipeline.
//!
//! Call [`pipeline::run`] to reconcile a whole roster, [`verify::verify_all`]
//! for the credential self-test, or [`admin::inspect`] / [`admin::remove`] for
//! one identity. Everything is generic over the capability traits of
//! `rostersync-client`, so tests pass a `MemoryBackend`.

pub mod admin;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod reconciler;
pub mod report;
pub mod resolver;
pub mod verify;

pub use error::{StageError, SyncError};
pub use options::RunOptions;
pub use pipeline::run;
pub use report::{
    Action, Compensation, EntryOutcome, EntryStatus, IdentityAction, RunReport, RunSummary, Stage,
    VerifyOutcome, VerifyStatus,
};
pub use resolver::Resolution;
