//! Run options: roster settings merged with command-line overrides.

use std::time::Duration;

use rostersync_core::types::{EmailMatch, ProfileWrite, RosterSettings};

/// Everything a reconciliation or verification run needs besides the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub email_match: EmailMatch,
    pub page_size: u32,
    /// Pause between roster entries.
    pub delay: Duration,
    /// Resolve and read only; report what would be written.
    pub dry_run: bool,
    /// Create identities for roster entries that have none.
    pub create_missing: bool,
    /// Overwrite credential, confirmation, and metadata of existing identities.
    pub reset_credentials: bool,
    pub profile_write: ProfileWrite,
}

impl RunOptions {
    pub fn from_settings(settings: &RosterSettings) -> Self {
        Self {
            email_match: settings.email_match,
            page_size: settings.page_size.max(1),
            delay: Duration::from_millis(settings.delay_ms),
            dry_run: false,
            create_missing: false,
            reset_credentials: false,
            profile_write: settings.profile_write,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from_settings(&RosterSettings::default())
    }
}
