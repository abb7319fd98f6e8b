pub mod inspect;
pub mod reconcile;
pub mod remove;
pub mod roster;
pub mod verify;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rostersync_client::{HttpBackend, ProfileTable};
use rostersync_core::{EnvConfig, Roster, RosterSettings};

use crate::{EmailMatchArg, ProfileKeyArg};

/// Settings flags shared by every command that talks to the service.
/// Each one overrides the matching key of the roster's `settings:` block.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Email comparison: exact | case_insensitive.
    #[arg(long, value_name = "MODE")]
    pub email_match: Option<EmailMatchArg>,

    /// Profile column holding the identity id: id | user_id.
    #[arg(long, value_name = "COLUMN")]
    pub profile_key: Option<ProfileKeyArg>,

    /// Name of the profile table.
    #[arg(long, value_name = "TABLE")]
    pub profile_table: Option<String>,
}

impl SettingsArgs {
    pub fn apply(&self, mut settings: RosterSettings) -> RosterSettings {
        if let Some(mode) = &self.email_match {
            settings.email_match = mode.0;
        }
        if let Some(key) = &self.profile_key {
            settings.profile_key = key.0;
        }
        if let Some(table) = &self.profile_table {
            settings.profile_table = table.clone();
        }
        settings
    }
}

/// `path` or `~/.rostersync/roster.yaml`.
pub fn roster_path(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => rostersync_core::roster::default_path().context("could not determine default roster location"),
    }
}

/// Load and validate a roster, failing with the file path in the message.
pub fn load_roster(path: &Path) -> Result<Roster> {
    rostersync_core::roster::load(path).with_context(|| format!("cannot use roster '{}'", path.display()))
}

/// Load a roster and apply the override flags, then validate it again under
/// the effective settings.
pub fn load_roster_with(path: &Path, overrides: &SettingsArgs) -> Result<Roster> {
    let roster = load_roster(path)?;
    let settings = overrides.apply(roster.settings.clone());
    rostersync_core::roster::with_settings(roster, settings)
        .with_context(|| format!("cannot use roster '{}' with these settings", path.display()))
}

/// Settings for single-identity commands: from the given roster, else from the
/// default roster if one exists, else built-in defaults. Override flags are
/// applied and the result validated.
pub fn settings_for(path: Option<PathBuf>, overrides: &SettingsArgs) -> Result<RosterSettings> {
    let path = match path {
        Some(path) => Some(path),
        None => rostersync_core::roster::default_path().ok().filter(|path| path.exists()),
    };
    if let Some(path) = path {
        return Ok(load_roster_with(&path, overrides)?.settings);
    }
    let settings = overrides.apply(RosterSettings::default());
    rostersync_core::roster::validate_settings(&settings).context("invalid settings")?;
    Ok(settings)
}

/// Read the service configuration and build the HTTP backend.
pub fn connect(settings: &RosterSettings, need_anon_key: bool) -> Result<HttpBackend> {
    let config = EnvConfig::from_env().context("service configuration is incomplete")?;
    if need_anon_key {
        config
            .require_anon_key()
            .context("service configuration is incomplete")?;
    }
    tracing::debug!(url = %config.url, timeout = ?config.timeout, "connecting");
    Ok(HttpBackend::new(
        &config,
        ProfileTable {
            name: settings.profile_table.clone(),
            key: settings.profile_key,
        },
    ))
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("failed to serialize JSON output")?
    );
    Ok(())
}

pub fn separator() -> String {
    "■".repeat(67).bright_black().to_string()
}
