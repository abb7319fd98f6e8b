//! Domain types for rosters, identities, and profiles.
//!
//! Identity and profile records are owned by the external service; the types
//! here are the in-process view of them. All types are serializable via serde
//! so the roster file (YAML) and the wire format (JSON) share one model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RosterError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// An email address as written in the roster or reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(pub String);

impl Email {
    /// Compare against another address under the given matching mode.
    pub fn matches(&self, other: &str, mode: EmailMatch) -> bool {
        match mode {
            EmailMatch::Exact => self.0 == other,
            EmailMatch::CaseInsensitive => self.0.eq_ignore_ascii_case(other),
        }
    }

    /// Key used to detect duplicates under the given matching mode.
    pub fn normalized(&self, mode: EmailMatch) -> String {
        match mode {
            EmailMatch::Exact => self.0.clone(),
            EmailMatch::CaseInsensitive => self.0.to_ascii_lowercase(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Email {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Email {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque, stable handle of an identity in the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Organizational branch code, e.g. `HN35`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Branch(pub String);

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Branch {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Role tag assigned to a staff member, e.g. `staff` or `manager`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A credential or API key. `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value. Only call this at the point of sending it over the wire.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Approval state of a profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// How roster emails are compared with identity emails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmailMatch {
    #[default]
    Exact,
    CaseInsensitive,
}

impl fmt::Display for EmailMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailMatch::Exact => write!(f, "exact"),
            EmailMatch::CaseInsensitive => write!(f, "case_insensitive"),
        }
    }
}

/// Column of the profile table that holds the identity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKey {
    #[default]
    Id,
    UserId,
}

impl ProfileKey {
    pub fn column(self) -> &'static str {
        match self {
            ProfileKey::Id => "id",
            ProfileKey::UserId => "user_id",
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// How a profile row is written for a freshly created identity.
///
/// `upsert` suits projects where a signup trigger already inserts a pending
/// row for every new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProfileWrite {
    #[default]
    Insert,
    Upsert,
}

/// Profile attributes the reconciler may rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    ApprovalStatus,
    Role,
    Branch,
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileField::ApprovalStatus => write!(f, "approval_status"),
            ProfileField::Role => write!(f, "role"),
            ProfileField::Branch => write!(f, "branch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Where a roster entry's password comes from.
///
/// Flattened into [`RosterEntry`], so the YAML reads either
/// `password: ...` or `password_env: SOME_VAR`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credential {
    Password(Secret),
    PasswordEnv(String),
}

impl Credential {
    /// Resolve the credential, reading the named variable for `password_env`.
    pub fn resolve(&self) -> Result<Secret, RosterError> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve the credential with an explicit variable lookup.
    pub fn resolve_with<F>(&self, lookup: F) -> Result<Secret, RosterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match self {
            Credential::Password(secret) => Ok(secret.clone()),
            Credential::PasswordEnv(name) => match lookup(name) {
                Some(value) if !value.is_empty() => Ok(Secret::new(value)),
                _ => Err(RosterError::UnresolvedCredential { var: name.clone() }),
            },
        }
    }
}

/// One expected staff account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub email: Email,
    pub display_name: String,
    #[serde(flatten)]
    pub credential: Credential,
    pub branch: Branch,
    pub role: Role,
}

impl RosterEntry {
    /// Metadata mapping attached to the identity on create and credential reset.
    pub fn identity_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("full_name".into(), Value::String(self.display_name.clone()));
        metadata.insert("role".into(), Value::String(self.role.0.clone()));
        metadata.insert("branch".into(), Value::String(self.branch.0.clone()));
        metadata
    }
}

/// Run settings carried in the roster file. CLI flags override these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSettings {
    #[serde(default = "default_profile_table")]
    pub profile_table: String,
    #[serde(default)]
    pub profile_key: ProfileKey,
    #[serde(default)]
    pub email_match: EmailMatch,
    #[serde(default)]
    pub profile_write: ProfileWrite,
    /// Pause between roster entries, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Page size used when listing identities.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_profile_table() -> String {
    "profiles".to_string()
}

fn default_delay_ms() -> u64 {
    500
}

fn default_page_size() -> u32 {
    1000
}

impl Default for RosterSettings {
    fn default() -> Self {
        Self {
            profile_table: default_profile_table(),
            profile_key: ProfileKey::default(),
            email_match: EmailMatch::default(),
            profile_write: ProfileWrite::default(),
            delay_ms: default_delay_ms(),
            page_size: default_page_size(),
        }
    }
}

/// Root of a roster file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub version: u32,
    #[serde(default)]
    pub settings: RosterSettings,
    #[serde(default)]
    pub entries: Vec<RosterEntry>,
}

// ---------------------------------------------------------------------------
// Externally owned records
// ---------------------------------------------------------------------------

/// A login-capable account in the authentication service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub email_confirmed: bool,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Application-level row describing role, branch, and approval for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Identity id, stored under the configured [`ProfileKey`] column.
    pub key: IdentityId,
    pub full_name: String,
    pub role: Role,
    pub branch: Branch,
    pub approval_status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Partial update of a profile row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<ApprovalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// The reconciled fields this patch rewrites. `approved_at` is a stamp,
    /// not a reconciled field, and is not listed.
    pub fn fields(&self) -> Vec<ProfileField> {
        let mut fields = Vec::new();
        if self.approval_status.is_some() {
            fields.push(ProfileField::ApprovalStatus);
        }
        if self.role.is_some() {
            fields.push(ProfileField::Role);
        }
        if self.branch.is_some() {
            fields.push(ProfileField::Branch);
        }
        fields
    }

    /// Apply the patch to a profile in place.
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(status) = self.approval_status {
            profile.approval_status = status;
        }
        if let Some(role) = &self.role {
            profile.role = role.clone();
        }
        if let Some(branch) = &self.branch {
            profile.branch = branch.clone();
        }
        if let Some(at) = self.approved_at {
            profile.approved_at = Some(at);
        }
    }
}

/// Request to create an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIdentity {
    pub email: Email,
    pub password: Secret,
    pub email_confirmed: bool,
    pub metadata: Map<String, Value>,
}

/// Update-by-id request. `None` fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentityUpdate {
    pub password: Option<Secret>,
    pub email_confirmed: Option<bool>,
    pub metadata: Option<Map<String, Value>>,
}

/// A signed-in session returned by password sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub access_token: Secret,
    pub identity_id: IdentityId,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
