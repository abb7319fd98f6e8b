//! Per-entry outcomes and the end-of-run report.
//!
//! Every roster entry ends in exactly one [`EntryStatus`]; nothing is retried.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rostersync_core::types::{ApprovalStatus, IdentityId, ProfileField};

/// Step of the per-entry flow at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the roster credential (`password_env`).
    Credential,
    /// Listing identities.
    Resolve,
    CreateIdentity,
    ResetCredentials,
    QueryProfile,
    WriteProfile,
    SignIn,
    SignOut,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Credential => "credential",
            Stage::Resolve => "resolve identity",
            Stage::CreateIdentity => "create identity",
            Stage::ResetCredentials => "reset credentials",
            Stage::QueryProfile => "query profile",
            Stage::WriteProfile => "write profile",
            Stage::SignIn => "sign in",
            Stage::SignOut => "sign out",
        };
        f.write_str(label)
    }
}

/// What happened to the identity of a reconciled entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAction {
    Existing,
    Created,
    CredentialsReset,
    WouldCreate,
    WouldResetCredentials,
}

/// What happened to the profile of a reconciled entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Created,
    Updated { fields: Vec<ProfileField> },
    Unchanged,
    WouldCreate,
    WouldUpdate { fields: Vec<ProfileField> },
}

impl Action {
    pub fn is_write(&self) -> bool {
        matches!(self, Action::Created | Action::Updated { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Created => write!(f, "created"),
            Action::Updated { fields } => write!(f, "updated ({})", join(fields)),
            Action::Unchanged => write!(f, "unchanged"),
            Action::WouldCreate => write!(f, "would create"),
            Action::WouldUpdate { fields } => write!(f, "would update ({})", join(fields)),
        }
    }
}

fn join(fields: &[ProfileField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result of the compensating delete after a failed profile write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Compensation {
    IdentityDeleted,
    DeleteFailed { error: String },
}

/// Terminal state of one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Reconciled {
        identity: IdentityAction,
        profile: Action,
    },
    IdentityMissing,
    Failed {
        stage: Stage,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        compensation: Option<Compensation>,
    },
}

/// Outcome of one roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOutcome {
    pub email: String,
    pub identity_id: Option<IdentityId>,
    #[serde(flatten)]
    pub status: EntryStatus,
}

impl EntryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, EntryStatus::Reconciled { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, EntryStatus::Failed { .. })
    }

    /// Short label for tables and logs.
    pub fn label(&self) -> String {
        match &self.status {
            EntryStatus::Reconciled { profile, .. } => profile.to_string(),
            EntryStatus::IdentityMissing => "identity missing".to_string(),
            EntryStatus::Failed { stage, .. } => format!("failed at {stage}"),
        }
    }
}

/// Accumulated outcomes of a reconciliation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub entries: Vec<EntryOutcome>,
}

/// Counts derived from a [`RunReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub planned: usize,
    pub missing: usize,
    pub failed: usize,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            started_at,
            dry_run,
            entries: Vec::new(),
        }
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.entries.len(),
            ..RunSummary::default()
        };
        for entry in &self.entries {
            match &entry.status {
                EntryStatus::Reconciled { profile, .. } => match profile {
                    Action::Created => summary.created += 1,
                    Action::Updated { .. } => summary.updated += 1,
                    Action::Unchanged => summary.unchanged += 1,
                    Action::WouldCreate | Action::WouldUpdate { .. } => summary.planned += 1,
                },
                EntryStatus::IdentityMissing => summary.missing += 1,
                EntryStatus::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(EntryOutcome::is_failure)
    }
}

/// Outcome of the credential reset and sign-in self-test for one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
    Verified {
        /// Approval status of the profile read after sign-in, if a row exists.
        profile: Option<ApprovalStatus>,
    },
    IdentityMissing,
    Failed {
        stage: Stage,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOutcome {
    pub email: String,
    pub identity_id: Option<IdentityId>,
    #[serde(flatten)]
    pub status: VerifyStatus,
}

impl VerifyOutcome {
    pub fn label(&self) -> String {
        match &self.status {
            VerifyStatus::Verified { profile: Some(status) } => format!("verified (profile {status})"),
            VerifyStatus::Verified { profile: None } => "verified (no profile)".to_string(),
            VerifyStatus::IdentityMissing => "identity missing".to_string(),
            VerifyStatus::Failed { stage, .. } => format!("failed at {stage}"),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.status, VerifyStatus::Failed { .. })
    }
}
