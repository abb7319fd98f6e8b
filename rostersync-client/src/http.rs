//! Blocking HTTP backend for a Supabase-compatible project.
//!
//! Auth admin calls go to `/auth/v1/admin/users`, end-user sign-in to
//! `/auth/v1/token`, and profile rows to `/rest/v1/<table>` with PostgREST
//! filters (`<key>=eq.<id>`). Admin and row-store calls authenticate with the
//! service key; sign-in and sign-out use the anonymous key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rostersync_core::config::EnvConfig;
use rostersync_core::types::{
    ApprovalStatus, Branch, Identity, IdentityId, IdentityUpdate, NewIdentity, Profile,
    ProfileKey, ProfilePatch, Role, Secret, Session,
};

use crate::error::{ClientError, ClientResult};
use crate::{IdentityService, ProfileStore};

/// Profile table name and the column that holds the identity id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    pub name: String,
    pub key: ProfileKey,
}

impl Default for ProfileTable {
    fn default() -> Self {
        Self {
            name: "profiles".to_string(),
            key: ProfileKey::Id,
        }
    }
}

/// Both capabilities over HTTP. Construct once per run and pass by reference.
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    service_key: Secret,
    anon_key: Option<Secret>,
    table: ProfileTable,
}

impl HttpBackend {
    pub fn new(config: &EnvConfig, table: ProfileTable) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            agent,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            anon_key: config.anon_key.clone(),
            table,
        }
    }

    pub fn table(&self) -> &ProfileTable {
        &self.table
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &self.url(path))
            .set("apikey", self.service_key.expose())
            .set("Authorization", &format!("Bearer {}", self.service_key.expose()))
    }

    fn anon(&self, method: &str, path: &str) -> ClientResult<ureq::Request> {
        let key = self
            .anon_key
            .as_ref()
            .ok_or(ClientError::NotConfigured("the anonymous key"))?;
        Ok(self
            .agent
            .request(method, &self.url(path))
            .set("apikey", key.expose()))
    }

    fn rows(&self, method: &str) -> ureq::Request {
        self.admin(method, &format!("/rest/v1/{}", self.table.name))
            .set("Accept", "application/json")
    }

    fn key_filter(&self, key: &IdentityId) -> (&'static str, String) {
        (self.table.key.column(), format!("eq.{}", key.0))
    }

    fn profile_row(&self, profile: &Profile) -> Value {
        let mut row = Map::new();
        row.insert(
            self.table.key.column().to_string(),
            Value::String(profile.key.0.clone()),
        );
        row.insert("full_name".into(), Value::String(profile.full_name.clone()));
        row.insert("role".into(), Value::String(profile.role.0.clone()));
        row.insert("branch".into(), Value::String(profile.branch.0.clone()));
        row.insert(
            "approval_status".into(),
            Value::String(profile.approval_status.to_string()),
        );
        if let Some(at) = profile.approved_at {
            row.insert("approved_at".into(), Value::String(at.to_rfc3339()));
        }
        Value::Object(row)
    }

    fn decode_profiles(&self, rows: Vec<Map<String, Value>>) -> ClientResult<Vec<Profile>> {
        rows.into_iter()
            .map(|row| profile_from_row(row, self.table.key))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UserWire {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_confirmed_at: Option<String>,
    #[serde(default)]
    confirmed_at: Option<String>,
    #[serde(default)]
    user_metadata: Option<Map<String, Value>>,
}

impl From<UserWire> for Identity {
    fn from(user: UserWire) -> Self {
        Identity {
            id: IdentityId(user.id),
            email: user.email.unwrap_or_default(),
            email_confirmed: user.email_confirmed_at.is_some() || user.confirmed_at.is_some(),
            metadata: user.user_metadata.unwrap_or_default(),
        }
    }
}

/// The listing endpoint answers `{ "users": [...] }`; older servers answer a
/// bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserListWire {
    Wrapped { users: Vec<UserWire> },
    Bare(Vec<UserWire>),
}

#[derive(Debug, Serialize)]
struct CreateUserWire<'a> {
    email: &'a str,
    password: &'a str,
    email_confirm: bool,
    user_metadata: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct UpdateUserWire<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email_confirm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_metadata: Option<&'a Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct TokenWire {
    access_token: String,
    user: UserWire,
}

#[derive(Debug, Default, Deserialize)]
struct ProfileColumnsWire {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    approval_status: Option<ApprovalStatus>,
    #[serde(default)]
    approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

fn profile_from_row(row: Map<String, Value>, key: ProfileKey) -> ClientResult<Profile> {
    let id = match row.get(key.column()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            return Err(ClientError::Decode {
                what: "profile row",
                message: format!("missing key column '{}'", key.column()),
            })
        }
    };
    let columns: ProfileColumnsWire =
        serde_json::from_value(Value::Object(row)).map_err(|e| ClientError::Decode {
            what: "profile row",
            message: e.to_string(),
        })?;
    Ok(Profile {
        key: IdentityId(id),
        full_name: columns.full_name.unwrap_or_default(),
        role: Role(columns.role.unwrap_or_default()),
        branch: Branch(columns.branch.unwrap_or_default()),
        approval_status: columns.approval_status.unwrap_or_default(),
        approved_at: columns.approved_at,
        created_at: columns.created_at,
        updated_at: columns.updated_at,
    })
}

// ---------------------------------------------------------------------------
// Request plumbing
// ---------------------------------------------------------------------------

fn endpoint_of(req: &ureq::Request) -> String {
    let url = req.url();
    let path = url
        .find("://")
        .and_then(|scheme| url[scheme + 3..].find('/').map(|i| &url[scheme + 3 + i..]))
        .unwrap_or(url);
    format!("{} {}", req.method(), path)
}

fn send(req: ureq::Request, body: Option<Value>) -> ClientResult<ureq::Response> {
    let endpoint = endpoint_of(&req);
    tracing::debug!(%endpoint, "request");
    let result = match body {
        Some(body) => req.send_json(body),
        None => req.call(),
    };
    match result {
        Ok(resp) => Ok(resp),
        Err(ureq::Error::Status(status, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            Err(ClientError::Status {
                endpoint,
                status,
                message: error_message(&body),
            })
        }
        Err(ureq::Error::Transport(transport)) => Err(ClientError::Transport {
            endpoint,
            message: transport.to_string(),
        }),
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    resp: ureq::Response,
    what: &'static str,
) -> ClientResult<T> {
    resp.into_json::<T>().map_err(|e| ClientError::Decode {
        what,
        message: e.to_string(),
    })
}

/// Pull the human-readable part out of an auth or PostgREST error body.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) {
        for field in ["msg", "message", "error_description", "error"] {
            if let Some(Value::String(s)) = obj.get(field) {
                return s.clone();
            }
        }
    }
    if body.is_empty() {
        "empty response body".to_string()
    } else {
        body.to_string()
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

impl IdentityService for HttpBackend {
    fn list_identities(&self, page: u32, per_page: u32) -> ClientResult<Vec<Identity>> {
        let req = self
            .admin("GET", "/auth/v1/admin/users")
            .query("page", &page.to_string())
            .query("per_page", &per_page.to_string());
        let list: UserListWire = decode(send(req, None)?, "identity list")?;
        let users = match list {
            UserListWire::Wrapped { users } => users,
            UserListWire::Bare(users) => users,
        };
        Ok(users.into_iter().map(Identity::from).collect())
    }

    fn create_identity(&self, request: &NewIdentity) -> ClientResult<Identity> {
        let body = CreateUserWire {
            email: request.email.as_str(),
            password: request.password.expose(),
            email_confirm: request.email_confirmed,
            user_metadata: &request.metadata,
        };
        let body = serde_json::to_value(body).map_err(|e| ClientError::Decode {
            what: "create identity request",
            message: e.to_string(),
        })?;
        let resp = send(self.admin("POST", "/auth/v1/admin/users"), Some(body))?;
        let user: UserWire = decode(resp, "created identity")?;
        Ok(user.into())
    }

    fn update_identity(&self, id: &IdentityId, update: &IdentityUpdate) -> ClientResult<Identity> {
        let body = UpdateUserWire {
            password: update.password.as_ref().map(Secret::expose),
            email_confirm: update.email_confirmed,
            user_metadata: update.metadata.as_ref(),
        };
        let body = serde_json::to_value(body).map_err(|e| ClientError::Decode {
            what: "update identity request",
            message: e.to_string(),
        })?;
        let path = format!("/auth/v1/admin/users/{}", id.0);
        let user: UserWire = decode(send(self.admin("PUT", &path), Some(body))?, "updated identity")?;
        Ok(user.into())
    }

    fn delete_identity(&self, id: &IdentityId) -> ClientResult<()> {
        let path = format!("/auth/v1/admin/users/{}", id.0);
        send(self.admin("DELETE", &path), None)?;
        Ok(())
    }

    fn sign_in(&self, email: &str, password: &Secret) -> ClientResult<Session> {
        let req = self
            .anon("POST", "/auth/v1/token")?
            .query("grant_type", "password");
        let body = serde_json::json!({ "email": email, "password": password.expose() });
        let token: TokenWire = decode(send(req, Some(body))?, "sign-in session")?;
        Ok(Session {
            access_token: Secret::new(token.access_token),
            identity_id: IdentityId(token.user.id),
        })
    }

    fn sign_out(&self, session: &Session) -> ClientResult<()> {
        let req = self
            .anon("POST", "/auth/v1/logout")?
            .set(
                "Authorization",
                &format!("Bearer {}", session.access_token.expose()),
            );
        send(req, None)?;
        Ok(())
    }
}

impl ProfileStore for HttpBackend {
    fn select_profile(&self, key: &IdentityId) -> ClientResult<Option<Profile>> {
        let (column, filter) = self.key_filter(key);
        let req = self.rows("GET").query(column, &filter).query("select", "*");
        let rows: Vec<Map<String, Value>> = decode(send(req, None)?, "profile rows")?;
        let mut profiles = self.decode_profiles(rows)?;
        match profiles.len() {
            0 => Ok(None),
            1 => Ok(profiles.pop()),
            n => Err(ClientError::Decode {
                what: "profile rows",
                message: format!("{n} rows share {column} = {key}"),
            }),
        }
    }

    fn insert_profile(&self, profile: &Profile) -> ClientResult<Profile> {
        let req = self.rows("POST").set("Prefer", "return=representation");
        let rows: Vec<Map<String, Value>> =
            decode(send(req, Some(self.profile_row(profile)))?, "inserted profile")?;
        first_row(self.decode_profiles(rows)?, &profile.key)
    }

    fn upsert_profile(&self, profile: &Profile) -> ClientResult<Profile> {
        let req = self
            .rows("POST")
            .query("on_conflict", self.table.key.column())
            .set("Prefer", "resolution=merge-duplicates,return=representation");
        let rows: Vec<Map<String, Value>> =
            decode(send(req, Some(self.profile_row(profile)))?, "upserted profile")?;
        first_row(self.decode_profiles(rows)?, &profile.key)
    }

    fn update_profile(&self, key: &IdentityId, patch: &ProfilePatch) -> ClientResult<()> {
        let (column, filter) = self.key_filter(key);
        let body = serde_json::to_value(patch).map_err(|e| ClientError::Decode {
            what: "profile patch",
            message: e.to_string(),
        })?;
        let req = self
            .rows("PATCH")
            .query(column, &filter)
            .set("Prefer", "return=representation");
        let rows: Vec<Map<String, Value>> = decode(send(req, Some(body))?, "updated profile")?;
        if rows.is_empty() {
            return Err(ClientError::NotFound(format!("profile with {column} = {key}")));
        }
        Ok(())
    }

    fn delete_profile(&self, key: &IdentityId) -> ClientResult<()> {
        let (column, filter) = self.key_filter(key);
        send(self.rows("DELETE").query(column, &filter), None)?;
        Ok(())
    }
}

fn first_row(mut profiles: Vec<Profile>, key: &IdentityId) -> ClientResult<Profile> {
    if profiles.is_empty() {
        return Err(ClientError::Decode {
            what: "profile rows",
            message: format!("write for {key} returned no row"),
        });
    }
    Ok(profiles.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_service_fields() {
        assert_eq!(error_message(r#"{"msg":"User not allowed"}"#), "User not allowed");
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key"}"#),
            "duplicate key"
        );
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
        assert_eq!(error_message(""), "empty response body");
    }

    #[test]
    fn row_decodes_under_either_key_column() {
        let row = json!({
            "user_id": "u-1",
            "full_name": "A",
            "role": "staff",
            "branch": "HN35",
            "approval_status": "approved",
            "approved_at": "2026-01-02T03:04:05Z",
            "phone": "unrelated"
        });
        let Value::Object(map) = row else { unreachable!() };
        let profile = profile_from_row(map.clone(), ProfileKey::UserId).expect("decode");
        assert_eq!(profile.key, IdentityId::from("u-1"));
        assert_eq!(profile.approval_status, ApprovalStatus::Approved);
        assert!(profile.approved_at.is_some());

        let err = profile_from_row(map, ProfileKey::Id).unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[test]
    fn null_columns_decode_as_empty() {
        let Value::Object(map) = json!({ "id": "u-2", "role": null, "branch": null }) else {
            unreachable!()
        };
        let profile = profile_from_row(map, ProfileKey::Id).expect("decode");
        assert_eq!(profile.role, Role(String::new()));
        assert_eq!(profile.approval_status, ApprovalStatus::Pending);
    }

    #[test]
    fn user_wire_confirmation_flag() {
        let user: UserWire = serde_json::from_value(json!({
            "id": "u-1",
            "email": "a@x.com",
            "email_confirmed_at": "2026-01-01T00:00:00Z",
            "user_metadata": { "full_name": "A" }
        }))
        .expect("decode");
        let identity = Identity::from(user);
        assert!(identity.email_confirmed);
        assert_eq!(identity.metadata["full_name"], "A");

        let bare: UserWire = serde_json::from_value(json!({ "id": "u-2", "email": null }))
            .expect("decode");
        let identity = Identity::from(bare);
        assert!(!identity.email_confirmed);
        assert_eq!(identity.email, "");
    }

    #[test]
    fn endpoint_strips_host() {
        let agent = ureq::AgentBuilder::new().build();
        let req = agent.request("GET", "https://proj.example.co/auth/v1/admin/users");
        assert_eq!(endpoint_of(&req), "GET /auth/v1/admin/users");
    }
}
