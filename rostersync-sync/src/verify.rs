//! Credential reset and sign-in self-test.
//!
//! Per entry: resolve → overwrite credential and confirm → sign in with the
//! new credential → read the profile → sign out. Once sign-in succeeds the
//! sign-out is always attempted, even if the profile read failed.

use rostersync_client::{IdentityService, ProfileStore};
use rostersync_core::types::{IdentityUpdate, RosterEntry};

use crate::options::RunOptions;
use crate::report::{Stage, VerifyOutcome, VerifyStatus};
use crate::resolver::{resolve, Resolution};

/// Verify every entry in order, sleeping between entries.
pub fn verify_all<B>(
    backend: &B,
    entries: &[RosterEntry],
    options: &RunOptions,
) -> Vec<VerifyOutcome>
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let mut outcomes = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if index > 0 && !options.delay.is_zero() {
            std::thread::sleep(options.delay);
        }
        let outcome = verify_entry(backend, entry, options);
        if let VerifyStatus::Failed { stage, error } = &outcome.status {
            tracing::warn!(email = %entry.email, %stage, %error, "verification failed");
        }
        outcomes.push(outcome);
    }
    outcomes
}

pub fn verify_entry<B>(backend: &B, entry: &RosterEntry, options: &RunOptions) -> VerifyOutcome
where
    B: IdentityService + ProfileStore + ?Sized,
{
    let mut outcome = VerifyOutcome {
        email: entry.email.to_string(),
        identity_id: None,
        status: VerifyStatus::IdentityMissing,
    };
    let fail = |stage: Stage, error: String| VerifyStatus::Failed { stage, error };

    let password = match entry.credential.resolve() {
        Ok(password) => password,
        Err(err) => {
            outcome.status = fail(Stage::Credential, err.to_string());
            return outcome;
        }
    };

    let identity = match resolve(backend, &entry.email, options.email_match, options.page_size) {
        Ok(Resolution::Found(identity)) => identity,
        Ok(Resolution::Missing) => return outcome,
        Err(err) => {
            outcome.status = fail(Stage::Resolve, err.to_string());
            return outcome;
        }
    };
    outcome.identity_id = Some(identity.id.clone());

    let update = IdentityUpdate {
        password: Some(password.clone()),
        email_confirmed: Some(true),
        metadata: None,
    };
    if let Err(err) = backend.update_identity(&identity.id, &update) {
        outcome.status = fail(Stage::ResetCredentials, err.to_string());
        return outcome;
    }

    // Sign in with the address the service holds; it may differ in case.
    let session = match backend.sign_in(&identity.email, &password) {
        Ok(session) => session,
        Err(err) => {
            outcome.status = fail(Stage::SignIn, err.to_string());
            return outcome;
        }
    };
    tracing::debug!(email = %entry.email, identity_id = %session.identity_id, "signed in");

    let read = if session.identity_id != identity.id {
        Err(fail(
            Stage::SignIn,
            format!(
                "session belongs to {}, expected {}",
                session.identity_id, identity.id
            ),
        ))
    } else {
        backend
            .select_profile(&identity.id)
            .map_err(|err| fail(Stage::QueryProfile, err.to_string()))
    };

    let signed_out = backend.sign_out(&session);

    outcome.status = match (read, signed_out) {
        (Err(status), _) => status,
        (Ok(_), Err(err)) => fail(Stage::SignOut, err.to_string()),
        (Ok(profile), Ok(())) => VerifyStatus::Verified {
            profile: profile.map(|p| p.approval_status),
        },
    };
    outcome
}
