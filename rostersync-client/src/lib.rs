//! # rostersync-client
//!
//! Capability interfaces over the BaaS platform and their implementations.
//!
//! - [`IdentityService`]: authentication admin API plus password sign-in
//! - [`ProfileStore`]: profile rows in the table store
//! - [`HttpBackend`]: both capabilities over the Supabase-compatible REST API
//! - [`MemoryBackend`]: both capabilities in process, recording every call
//!
//! Callers construct a backend explicitly and pass it by reference; there is
//! no global client.

pub mod error;
pub mod http;
pub mod memory;

pub use error::{ClientError, ClientResult};
pub use http::{HttpBackend, ProfileTable};
pub use memory::{Call, MemoryBackend, Op};

use rostersync_core::types::{
    Identity, IdentityId, IdentityUpdate, NewIdentity, Profile, ProfilePatch, Secret, Session,
};

/// Operations consumed from the authentication service.
pub trait IdentityService {
    /// One page of registered identities. Pages are 1-based; a page shorter
    /// than `per_page` is the last one.
    fn list_identities(&self, page: u32, per_page: u32) -> ClientResult<Vec<Identity>>;

    /// Create a login-capable identity.
    fn create_identity(&self, request: &NewIdentity) -> ClientResult<Identity>;

    /// Overwrite credential, confirmation flag, or metadata of an identity.
    fn update_identity(&self, id: &IdentityId, update: &IdentityUpdate) -> ClientResult<Identity>;

    fn delete_identity(&self, id: &IdentityId) -> ClientResult<()>;

    /// Password sign-in as the end user.
    fn sign_in(&self, email: &str, password: &Secret) -> ClientResult<Session>;

    fn sign_out(&self, session: &Session) -> ClientResult<()>;
}

/// Operations consumed from the profile table.
pub trait ProfileStore {
    /// The profile keyed by `key`, if any. More than one matching row is an
    /// error: the key is expected to be unique.
    fn select_profile(&self, key: &IdentityId) -> ClientResult<Option<Profile>>;

    fn insert_profile(&self, profile: &Profile) -> ClientResult<Profile>;

    /// Insert, or merge into the existing row with the same key.
    fn upsert_profile(&self, profile: &Profile) -> ClientResult<Profile>;

    /// Write only the fields set in `patch`. Errors with `NotFound` when no
    /// row matches.
    fn update_profile(&self, key: &IdentityId, patch: &ProfilePatch) -> ClientResult<()>;

    fn delete_profile(&self, key: &IdentityId) -> ClientResult<()>;
}
