//! In-process backend.
//!
//! Holds identities and profile rows in memory and records every call in
//! order, so tests can assert exactly which reads and writes a run issued.
//! Individual operations can be made to fail with [`MemoryBackend::fail_on`].

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use serde_json::Map;

use rostersync_core::types::{
    Email, Identity, IdentityId, IdentityUpdate, NewIdentity, Profile, ProfileField, ProfilePatch,
    Secret, Session,
};

use crate::error::{ClientError, ClientResult};
use crate::{IdentityService, ProfileStore};

/// Operation selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListIdentities,
    CreateIdentity,
    UpdateIdentity,
    DeleteIdentity,
    SignIn,
    SignOut,
    SelectProfile,
    InsertProfile,
    UpsertProfile,
    UpdateProfile,
    DeleteProfile,
}

/// One recorded call, with the arguments tests care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListIdentities { page: u32 },
    CreateIdentity { email: String },
    UpdateIdentity { id: IdentityId, password: bool },
    DeleteIdentity { id: IdentityId },
    SignIn { email: String },
    SignOut { id: IdentityId },
    SelectProfile { key: IdentityId },
    InsertProfile { key: IdentityId },
    UpsertProfile { key: IdentityId },
    UpdateProfile { key: IdentityId, fields: Vec<ProfileField> },
    DeleteProfile { key: IdentityId },
}

impl Call {
    /// Whether the call changes state in the backend.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            Call::ListIdentities { .. }
                | Call::SelectProfile { .. }
                | Call::SignIn { .. }
                | Call::SignOut { .. }
        )
    }
}

#[derive(Default)]
struct State {
    identities: Vec<(Identity, Secret)>,
    profiles: Vec<Profile>,
    calls: Vec<Call>,
    failures: HashSet<Op>,
    next_id: u64,
}

/// In-memory implementation of both capabilities.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a confirmed identity and return its id.
    pub fn add_identity(&self, email: &str, password: &str) -> IdentityId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = IdentityId(format!("mem-{}", state.next_id));
        state.identities.push((
            Identity {
                id: id.clone(),
                email: email.to_string(),
                email_confirmed: true,
                metadata: Map::new(),
            },
            Secret::new(password),
        ));
        id
    }

    /// Seed a profile row.
    pub fn add_profile(&self, profile: Profile) {
        self.lock().profiles.push(profile);
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.lock().identities.iter().map(|(i, _)| i.clone()).collect()
    }

    pub fn identity_by_email(&self, email: &str) -> Option<Identity> {
        self.lock()
            .identities
            .iter()
            .find(|(i, _)| i.email == email)
            .map(|(i, _)| i.clone())
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.lock().profiles.clone()
    }

    pub fn profile(&self, key: &IdentityId) -> Option<Profile> {
        self.lock().profiles.iter().find(|p| &p.key == key).cloned()
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Only the state-changing calls, in order.
    pub fn writes(&self) -> Vec<Call> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Make every subsequent call of `op` fail with HTTP 500.
    pub fn fail_on(&self, op: Op) {
        self.lock().failures.insert(op);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Record the call, then fail it if `op` was marked failing.
    fn enter(&self, op: Op, call: Call) -> ClientResult<MutexGuard<'_, State>> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.failures.contains(&op) {
            return Err(ClientError::Status {
                endpoint: format!("memory {op:?}"),
                status: 500,
                message: "injected failure".to_string(),
            });
        }
        Ok(state)
    }
}

fn status(op: &str, status: u16, message: impl Into<String>) -> ClientError {
    ClientError::Status {
        endpoint: format!("memory {op}"),
        status,
        message: message.into(),
    }
}

impl IdentityService for MemoryBackend {
    fn list_identities(&self, page: u32, per_page: u32) -> ClientResult<Vec<Identity>> {
        let state = self.enter(Op::ListIdentities, Call::ListIdentities { page })?;
        let per_page = per_page.max(1) as usize;
        let skip = (page.max(1) as usize - 1) * per_page;
        Ok(state
            .identities
            .iter()
            .skip(skip)
            .take(per_page)
            .map(|(i, _)| i.clone())
            .collect())
    }

    fn create_identity(&self, request: &NewIdentity) -> ClientResult<Identity> {
        let mut state = self.enter(
            Op::CreateIdentity,
            Call::CreateIdentity {
                email: request.email.0.clone(),
            },
        )?;
        if state
            .identities
            .iter()
            .any(|(i, _)| Email::from(i.email.as_str()) == request.email)
        {
            return Err(status(
                "CreateIdentity",
                422,
                "A user with this email address has already been registered",
            ));
        }
        state.next_id += 1;
        let identity = Identity {
            id: IdentityId(format!("mem-{}", state.next_id)),
            email: request.email.0.clone(),
            email_confirmed: request.email_confirmed,
            metadata: request.metadata.clone(),
        };
        state
            .identities
            .push((identity.clone(), request.password.clone()));
        Ok(identity)
    }

    fn update_identity(&self, id: &IdentityId, update: &IdentityUpdate) -> ClientResult<Identity> {
        let mut state = self.enter(
            Op::UpdateIdentity,
            Call::UpdateIdentity {
                id: id.clone(),
                password: update.password.is_some(),
            },
        )?;
        let Some((identity, password)) = state.identities.iter_mut().find(|(i, _)| &i.id == id)
        else {
            return Err(status("UpdateIdentity", 404, "User not found"));
        };
        if let Some(new_password) = &update.password {
            *password = new_password.clone();
        }
        if let Some(confirmed) = update.email_confirmed {
            identity.email_confirmed = confirmed;
        }
        if let Some(metadata) = &update.metadata {
            identity.metadata.extend(metadata.clone());
        }
        Ok(identity.clone())
    }

    fn delete_identity(&self, id: &IdentityId) -> ClientResult<()> {
        let mut state = self.enter(Op::DeleteIdentity, Call::DeleteIdentity { id: id.clone() })?;
        let before = state.identities.len();
        state.identities.retain(|(i, _)| &i.id != id);
        if state.identities.len() == before {
            return Err(status("DeleteIdentity", 404, "User not found"));
        }
        Ok(())
    }

    fn sign_in(&self, email: &str, password: &Secret) -> ClientResult<Session> {
        let state = self.enter(
            Op::SignIn,
            Call::SignIn {
                email: email.to_string(),
            },
        )?;
        let found = state
            .identities
            .iter()
            .find(|(i, p)| i.email == email && p == password);
        match found {
            Some((identity, _)) if identity.email_confirmed => Ok(Session {
                access_token: Secret::new(format!("token-{}", identity.id)),
                identity_id: identity.id.clone(),
            }),
            Some(_) => Err(status("SignIn", 400, "Email not confirmed")),
            None => Err(status("SignIn", 400, "Invalid login credentials")),
        }
    }

    fn sign_out(&self, session: &Session) -> ClientResult<()> {
        let _state = self.enter(
            Op::SignOut,
            Call::SignOut {
                id: session.identity_id.clone(),
            },
        )?;
        Ok(())
    }
}

impl ProfileStore for MemoryBackend {
    fn select_profile(&self, key: &IdentityId) -> ClientResult<Option<Profile>> {
        let state = self.enter(Op::SelectProfile, Call::SelectProfile { key: key.clone() })?;
        let mut rows = state.profiles.iter().filter(|p| &p.key == key);
        let first = rows.next().cloned();
        if rows.next().is_some() {
            return Err(ClientError::Decode {
                what: "profile rows",
                message: format!("several rows share key {key}"),
            });
        }
        Ok(first)
    }

    fn insert_profile(&self, profile: &Profile) -> ClientResult<Profile> {
        let mut state = self.enter(
            Op::InsertProfile,
            Call::InsertProfile {
                key: profile.key.clone(),
            },
        )?;
        if state.profiles.iter().any(|p| p.key == profile.key) {
            return Err(status(
                "InsertProfile",
                409,
                "duplicate key value violates unique constraint",
            ));
        }
        state.profiles.push(profile.clone());
        Ok(profile.clone())
    }

    fn upsert_profile(&self, profile: &Profile) -> ClientResult<Profile> {
        let mut state = self.enter(
            Op::UpsertProfile,
            Call::UpsertProfile {
                key: profile.key.clone(),
            },
        )?;
        match state.profiles.iter_mut().find(|p| p.key == profile.key) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = profile.clone();
                existing.created_at = created_at;
                Ok(existing.clone())
            }
            None => {
                state.profiles.push(profile.clone());
                Ok(profile.clone())
            }
        }
    }

    fn update_profile(&self, key: &IdentityId, patch: &ProfilePatch) -> ClientResult<()> {
        let mut state = self.enter(
            Op::UpdateProfile,
            Call::UpdateProfile {
                key: key.clone(),
                fields: patch.fields(),
            },
        )?;
        let mut matched = false;
        for profile in state.profiles.iter_mut().filter(|p| &p.key == key) {
            patch.apply(profile);
            matched = true;
        }
        if !matched {
            return Err(ClientError::NotFound(format!("profile with key {key}")));
        }
        Ok(())
    }

    fn delete_profile(&self, key: &IdentityId) -> ClientResult<()> {
        let mut state = self.enter(Op::DeleteProfile, Call::DeleteProfile { key: key.clone() })?;
        state.profiles.retain(|p| &p.key != key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rostersync_core::types::{ApprovalStatus, Branch, Role};

    fn profile(key: &IdentityId) -> Profile {
        Profile {
            key: key.clone(),
            full_name: "A".into(),
            role: Role::from("staff"),
            branch: Branch::from("HN35"),
            approval_status: ApprovalStatus::Pending,
            approved_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn listing_is_paged() {
        let backend = MemoryBackend::new();
        for n in 0..5 {
            backend.add_identity(&format!("u{n}@x.com"), "pw");
        }
        assert_eq!(backend.list_identities(1, 2).unwrap().len(), 2);
        assert_eq!(backend.list_identities(3, 2).unwrap().len(), 1);
        assert!(backend.list_identities(4, 2).unwrap().is_empty());
    }

    #[test]
    fn calls_are_recorded_and_writes_filtered() {
        let backend = MemoryBackend::new();
        let id = backend.add_identity("a@x.com", "pw");
        backend.select_profile(&id).unwrap();
        backend.insert_profile(&profile(&id)).unwrap();
        assert_eq!(backend.calls().len(), 2);
        assert_eq!(backend.writes(), vec![Call::InsertProfile { key: id }]);
    }

    #[test]
    fn injected_failure_is_still_recorded() {
        let backend = MemoryBackend::new();
        backend.fail_on(Op::ListIdentities);
        let err = backend.list_identities(1, 10).unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(backend.calls(), vec![Call::ListIdentities { page: 1 }]);
    }

    #[test]
    fn sign_out_is_recorded_and_releases_state() {
        let backend = MemoryBackend::new();
        let id = backend.add_identity("a@x.com", "pw");
        let session = backend.sign_in("a@x.com", &Secret::new("pw")).unwrap();
        backend.sign_out(&session).unwrap();
        backend.sign_out(&session).unwrap();
        assert_eq!(
            &backend.calls()[1..],
            &[Call::SignOut { id: id.clone() }, Call::SignOut { id }]
        );

        backend.fail_on(Op::SignOut);
        assert_eq!(backend.sign_out(&session).unwrap_err().status(), Some(500));
    }

    #[test]
    fn duplicate_insert_conflicts_but_upsert_merges() {
        let backend = MemoryBackend::new();
        let id = backend.add_identity("a@x.com", "pw");
        backend.insert_profile(&profile(&id)).unwrap();
        let err = backend.insert_profile(&profile(&id)).unwrap_err();
        assert_eq!(err.status(), Some(409));

        let mut approved = profile(&id);
        approved.approval_status = ApprovalStatus::Approved;
        backend.upsert_profile(&approved).unwrap();
        assert_eq!(backend.profiles().len(), 1);
        assert_eq!(
            backend.profile(&id).unwrap().approval_status,
            ApprovalStatus::Approved
        );
    }

    #[test]
    fn sign_in_requires_matching_password_and_confirmation() {
        let backend = MemoryBackend::new();
        let id = backend.add_identity("a@x.com", "pw");
        assert!(backend.sign_in("a@x.com", &Secret::new("nope")).is_err());
        let session = backend.sign_in("a@x.com", &Secret::new("pw")).unwrap();
        assert_eq!(session.identity_id, id);

        backend
            .update_identity(
                &id,
                &IdentityUpdate {
                    email_confirmed: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let err = backend.sign_in("a@x.com", &Secret::new("pw")).unwrap_err();
        assert!(err.to_string().contains("not confirmed"));
    }

    #[test]
    fn update_of_missing_profile_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend
            .update_profile(&IdentityId::from("ghost"), &ProfilePatch::default())
            .unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }
}
