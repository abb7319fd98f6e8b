//! rostersync core library: domain types, roster files, configuration, errors.
//!
//! - [`types`]: newtypes, roster model, identity and profile records
//! - [`roster`]: load / validate / save roster files
//! - [`config`]: service endpoint and keys from the environment
//! - [`error`]: [`RosterError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod roster;
pub mod types;

pub use config::EnvConfig;
pub use error::{ConfigError, RosterError};
pub use types::{
    ApprovalStatus, Branch, Credential, Email, EmailMatch, Identity, IdentityId, IdentityUpdate,
    NewIdentity, Profile, ProfileField, ProfileKey, ProfilePatch, ProfileWrite, Role, Roster,
    RosterEntry, RosterSettings, Secret, Session,
};
