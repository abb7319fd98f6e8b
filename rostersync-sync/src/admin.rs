//! Single-identity diagnostics and removal.

use serde::Serialize;

use rostersync_client::{IdentityService, ProfileStore};
use rostersync_core::types::{Email, EmailMatch, Identity, Profile};

use crate::error::SyncError;
use crate::resolver::{resolve, Resolution};

/// An identity together with its profile row, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inspection {
    pub identity: Identity,
    pub profile: Option<Profile>,
}

/// What [`remove`] deleted, or would delete under dry run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Removal {
    pub identity: Identity,
    pub profile_deleted: bool,
    pub dry_run: bool,
}

/// Resolve one email and read its profile. Read-only.
pub fn inspect<B>(
    backend: &B,
    email: &Email,
    mode: EmailMatch,
    page_size: u32,
) -> Result<Inspection, SyncError>
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let identity = find_identity(backend, email, mode, page_size)?;
    let profile = backend.select_profile(&identity.id)?;
    Ok(Inspection { identity, profile })
}

/// Delete the profile row, then the identity.
///
/// The profile goes first so a failure never leaves a row pointing at a
/// deleted identity.
pub fn remove<B>(
    backend: &B,
    email: &Email,
    mode: EmailMatch,
    page_size: u32,
    dry_run: bool,
) -> Result<Removal, SyncError>
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let Inspection { identity, profile } = inspect(backend, email, mode, page_size)?;
    let has_profile = profile.is_some();

    if dry_run {
        tracing::info!(email = %email, identity_id = %identity.id, "[dry-run] would remove");
        return Ok(Removal {
            identity,
            profile_deleted: has_profile,
            dry_run,
        });
    }

    if has_profile {
        backend.delete_profile(&identity.id)?;
    }
    backend.delete_identity(&identity.id)?;
    tracing::info!(email = %email, identity_id = %identity.id, "removed identity");
    Ok(Removal {
        identity,
        profile_deleted: has_profile,
        dry_run,
    })
}

fn find_identity<S>(
    service: &S,
    email: &Email,
    mode: EmailMatch,
    page_size: u32,
) -> Result<Identity, SyncError>
where
    S: IdentityService + ?Sized,
{
    match resolve(service, email, mode, page_size)? {
        Resolution::Found(identity) => Ok(identity),
        Resolution::Missing => Err(SyncError::IdentityNotFound {
            email: email.to_string(),
        }),
    }
}
