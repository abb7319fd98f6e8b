//! Service endpoint and key configuration.
//!
//! Values come from the process environment. A `.env` file in the working
//! directory is loaded first if present; variables already set in the
//! environment win over the file.

use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Secret;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const SERVICE_KEY_VAR: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const TIMEOUT_VAR: &str = "ROSTERSYNC_HTTP_TIMEOUT_SECS";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the BaaS platform.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    /// Base URL of the project, without trailing slash.
    pub url: String,
    /// Elevated key used for administrative calls.
    pub service_key: Secret,
    /// Public key used to sign in as an end user. Only `verify` needs it.
    pub anon_key: Option<Secret>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl EnvConfig {
    /// Load `.env` (if any) and read the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv()?;
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = required(&lookup, URL_VAR)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidVar {
                name: URL_VAR,
                reason: "expected an http:// or https:// URL".to_string(),
            });
        }
        let service_key = Secret::new(required(&lookup, SERVICE_KEY_VAR)?);
        let anon_key = optional(&lookup, ANON_KEY_VAR).map(Secret::new);
        let timeout = match optional(&lookup, TIMEOUT_VAR) {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidVar {
                        name: TIMEOUT_VAR,
                        reason: format!("expected a positive number of seconds, got '{raw}'"),
                    })
                }
            },
        };

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
            anon_key,
            timeout,
        })
    }

    /// The anonymous key, or a fatal error naming the missing variable.
    pub fn require_anon_key(&self) -> Result<&Secret, ConfigError> {
        self.anon_key
            .as_ref()
            .ok_or(ConfigError::MissingVar(ANON_KEY_VAR))
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, name).ok_or(ConfigError::MissingVar(name))
}

fn optional<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).filter(|v| !v.trim().is_empty())
}

/// Load `.env` from the working directory or its parents, if one exists.
pub fn load_dotenv() -> Result<(), ConfigError> {
    match dotenvy::dotenv() {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err.into()),
    }
}
