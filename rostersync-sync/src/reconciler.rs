//! Profile reconciliation: decide and apply create, update, or no-op.
//!
//! [`plan`] is pure and holds the decision table. [`reconcile_profile`]
//! reads the current row, plans, and issues at most one write.

use chrono::{DateTime, Utc};

use rostersync_client::ProfileStore;
use rostersync_core::types::{ApprovalStatus, IdentityId, Profile, ProfilePatch, RosterEntry};

use crate::error::StageError;
use crate::report::{Action, Stage};

/// The write needed to bring a profile in line with its roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilePlan {
    Create(Profile),
    Update(ProfilePatch),
    Keep,
}

/// A fresh, approved profile for `key` carrying the entry's attributes.
pub fn new_profile(key: &IdentityId, entry: &RosterEntry, now: DateTime<Utc>) -> Profile {
    Profile {
        key: key.clone(),
        full_name: entry.display_name.clone(),
        role: entry.role.clone(),
        branch: entry.branch.clone(),
        approval_status: ApprovalStatus::Approved,
        approved_at: Some(now),
        created_at: None,
        updated_at: None,
    }
}

/// Compare the current row (if any) with the roster entry.
///
/// Only drifted fields end up in the patch. Every update also stamps
/// `approved_at`; a profile with no drift is left alone.
pub fn plan(
    existing: Option<&Profile>,
    key: &IdentityId,
    entry: &RosterEntry,
    now: DateTime<Utc>,
) -> ProfilePlan {
    let Some(current) = existing else {
        return ProfilePlan::Create(new_profile(key, entry, now));
    };

    let mut patch = ProfilePatch::default();
    if current.approval_status != ApprovalStatus::Approved {
        patch.approval_status = Some(ApprovalStatus::Approved);
    }
    if current.role != entry.role {
        patch.role = Some(entry.role.clone());
    }
    if current.branch != entry.branch {
        patch.branch = Some(entry.branch.clone());
    }

    if patch.is_empty() {
        return ProfilePlan::Keep;
    }
    patch.approved_at = Some(now);
    ProfilePlan::Update(patch)
}

/// Query the profile for `key` and apply the planned write.
///
/// With `dry_run` the query still runs but nothing is written.
pub fn reconcile_profile<S>(
    store: &S,
    key: &IdentityId,
    entry: &RosterEntry,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<Action, StageError>
where
    S: ProfileStore + ?Sized,
{
    let existing = store
        .select_profile(key)
        .map_err(StageError::at(Stage::QueryProfile))?;

    match plan(existing.as_ref(), key, entry, now) {
        ProfilePlan::Keep => {
            tracing::debug!(email = %entry.email, identity_id = %key, "profile unchanged");
            Ok(Action::Unchanged)
        }
        ProfilePlan::Create(_) if dry_run => {
            tracing::info!(email = %entry.email, identity_id = %key, "[dry-run] would create profile");
            Ok(Action::WouldCreate)
        }
        ProfilePlan::Update(patch) if dry_run => {
            tracing::info!(email = %entry.email, identity_id = %key, "[dry-run] would update profile");
            Ok(Action::WouldUpdate {
                fields: patch.fields(),
            })
        }
        ProfilePlan::Create(profile) => {
            store
                .insert_profile(&profile)
                .map_err(StageError::at(Stage::WriteProfile))?;
            tracing::info!(email = %entry.email, identity_id = %key, "created profile");
            Ok(Action::Created)
        }
        ProfilePlan::Update(patch) => {
            store
                .update_profile(key, &patch)
                .map_err(StageError::at(Stage::WriteProfile))?;
            let fields = patch.fields();
            tracing::info!(email = %entry.email, identity_id = %key, ?fields, "updated profile");
            Ok(Action::Updated { fields })
        }
    }
}
