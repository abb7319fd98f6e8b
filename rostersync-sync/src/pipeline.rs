//! Reconciliation run: every roster entry, in order, with a throttle between
//! entries.
//!
//! Per entry: resolve the identity, optionally create it or reset its
//! credentials, then reconcile its profile. Failures end that entry only.

use chrono::{DateTime, Utc};

use rostersync_client::{ClientError, IdentityService, ProfileStore};
use rostersync_core::error::RosterError;
use rostersync_core::types::{
    Identity, IdentityId, IdentityUpdate, NewIdentity, ProfileWrite, RosterEntry, Secret,
};

use crate::options::RunOptions;
use crate::reconciler::{new_profile, reconcile_profile};
use crate::report::{
    Action, Compensation, EntryOutcome, EntryStatus, IdentityAction, RunReport, Stage,
};
use crate::resolver::{resolve, Resolution};

/// Reconcile every entry against `backend`.
///
/// `now` stamps created and newly approved profiles. The delay in `options`
/// is slept between entries, never after the last one.
pub fn run<B>(
    backend: &B,
    entries: &[RosterEntry],
    options: &RunOptions,
    now: DateTime<Utc>,
) -> RunReport
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let mut report = RunReport::new(now, options.dry_run);
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 && !options.delay.is_zero() {
            std::thread::sleep(options.delay);
        }
        let outcome = reconcile_entry(backend, entry, options, now);
        if let EntryStatus::Failed { stage, error, .. } = &outcome.status {
            tracing::warn!(email = %entry.email, %stage, %error, "entry failed");
        }
        report.entries.push(outcome);
    }
    let summary = report.summary();
    tracing::info!(
        total = summary.total,
        failed = summary.failed,
        missing = summary.missing,
        "reconciliation finished"
    );
    report
}

/// Run one entry to its terminal state.
pub fn reconcile_entry<B>(
    backend: &B,
    entry: &RosterEntry,
    options: &RunOptions,
    now: DateTime<Utc>,
) -> EntryOutcome
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let outcome = |identity_id: Option<IdentityId>, status: EntryStatus| EntryOutcome {
        email: entry.email.to_string(),
        identity_id,
        status,
    };

    let resolution = match resolve(backend, &entry.email, options.email_match, options.page_size) {
        Ok(resolution) => resolution,
        Err(err) => return outcome(None, failed(Stage::Resolve, &err, None)),
    };

    match resolution {
        Resolution::Missing if !options.create_missing => {
            tracing::info!(email = %entry.email, "no identity");
            outcome(None, EntryStatus::IdentityMissing)
        }
        Resolution::Missing => {
            let password = match entry.credential.resolve() {
                Ok(password) => password,
                Err(err) => return outcome(None, credential_failed(&err)),
            };
            if options.dry_run {
                tracing::info!(email = %entry.email, "[dry-run] would create identity");
                return outcome(
                    None,
                    EntryStatus::Reconciled {
                        identity: IdentityAction::WouldCreate,
                        profile: Action::WouldCreate,
                    },
                );
            }
            create_with_profile(backend, entry, password, options.profile_write, now)
        }
        Resolution::Found(identity) => {
            let id = identity.id.clone();
            let identity_action = match reset_if_requested(backend, entry, &identity, options) {
                Ok(action) => action,
                Err(status) => return outcome(Some(id), status),
            };
            match reconcile_profile(backend, &id, entry, now, options.dry_run) {
                Ok(profile) => outcome(
                    Some(id),
                    EntryStatus::Reconciled {
                        identity: identity_action,
                        profile,
                    },
                ),
                Err(err) => outcome(Some(id), failed(err.stage, &err.source, None)),
            }
        }
    }
}

/// Overwrite credential, confirmation, and metadata of an existing identity
/// when `reset_credentials` is set.
fn reset_if_requested<S>(
    service: &S,
    entry: &RosterEntry,
    identity: &Identity,
    options: &RunOptions,
) -> Result<IdentityAction, EntryStatus>
where
    S: IdentityService + ?Sized,
{
    if !options.reset_credentials {
        return Ok(IdentityAction::Existing);
    }
    let password = entry.credential.resolve().map_err(|err| credential_failed(&err))?;
    if options.dry_run {
        tracing::info!(email = %entry.email, identity_id = %identity.id, "[dry-run] would reset credentials");
        return Ok(IdentityAction::WouldResetCredentials);
    }
    let update = IdentityUpdate {
        password: Some(password),
        email_confirmed: Some(true),
        metadata: Some(entry.identity_metadata()),
    };
    service
        .update_identity(&identity.id, &update)
        .map_err(|err| failed(Stage::ResetCredentials, &err, None))?;
    tracing::info!(email = %entry.email, identity_id = %identity.id, "reset credentials");
    Ok(IdentityAction::CredentialsReset)
}

/// Create a confirmed identity and its approved profile.
///
/// The profile is written straight away, without a query. If that write
/// fails the identity is deleted again by the same id.
fn create_with_profile<B>(
    backend: &B,
    entry: &RosterEntry,
    password: Secret,
    write: ProfileWrite,
    now: DateTime<Utc>,
) -> EntryOutcome
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let request = NewIdentity {
        email: entry.email.clone(),
        password,
        email_confirmed: true,
        metadata: entry.identity_metadata(),
    };
    let identity = match backend.create_identity(&request) {
        Ok(identity) => identity,
        Err(err) => {
            return EntryOutcome {
                email: entry.email.to_string(),
                identity_id: None,
                status: failed(Stage::CreateIdentity, &err, None),
            }
        }
    };
    tracing::info!(email = %entry.email, identity_id = %identity.id, "created identity");

    let profile = new_profile(&identity.id, entry, now);
    let written = match write {
        ProfileWrite::Insert => backend.insert_profile(&profile),
        ProfileWrite::Upsert => backend.upsert_profile(&profile),
    };

    let status = match written {
        Ok(_) => {
            tracing::info!(email = %entry.email, identity_id = %identity.id, "created profile");
            EntryStatus::Reconciled {
                identity: IdentityAction::Created,
                profile: Action::Created,
            }
        }
        Err(err) => {
            let compensation = compensate(backend, entry, &identity.id);
            failed(Stage::WriteProfile, &err, Some(compensation))
        }
    };
    EntryOutcome {
        email: entry.email.to_string(),
        identity_id: Some(identity.id),
        status,
    }
}

fn compensate<S>(service: &S, entry: &RosterEntry, id: &IdentityId) -> Compensation
where
    S: IdentityService + ?Sized,
{
    match service.delete_identity(id) {
        Ok(()) => {
            tracing::warn!(email = %entry.email, identity_id = %id, "profile write failed, identity deleted");
            Compensation::IdentityDeleted
        }
        Err(err) => {
            tracing::error!(
                email = %entry.email,
                identity_id = %id,
                error = %err,
                "profile write failed and identity could not be deleted"
            );
            Compensation::DeleteFailed {
                error: err.to_string(),
            }
        }
    }
}

fn failed(stage: Stage, err: &ClientError, compensation: Option<Compensation>) -> EntryStatus {
    EntryStatus::Failed {
        stage,
        error: err.to_string(),
        compensation,
    }
}

fn credential_failed(err: &RosterError) -> EntryStatus {
    EntryStatus::Failed {
        stage: Stage::Credential,
        error: err.to_string(),
        compensation: None,
    }
}
