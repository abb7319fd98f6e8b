//! `rostersync remove <email> --confirm`: delete a profile and its identity.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use rostersync_core::types::Email;
use rostersync_sync::admin;

use super::{connect, settings_for, SettingsArgs};

/// Arguments for `rostersync remove`.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Email of the identity to delete.
    pub email: String,

    /// Required unless `--dry-run`; the deletion cannot be undone.
    #[arg(long)]
    pub confirm: bool,

    /// Resolve only; print what would be deleted.
    #[arg(long)]
    pub dry_run: bool,

    /// Roster whose settings to use (default roster if present).
    #[arg(long)]
    pub roster: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,
}

impl RemoveArgs {
    pub fn run(self) -> Result<()> {
        if !self.confirm && !self.dry_run {
            bail!("refusing to delete '{}' without --confirm", self.email);
        }
        let settings = settings_for(self.roster.clone(), &self.settings)?;
        let backend = connect(&settings, false)?;
        let email = Email::from(self.email.as_str());

        let removal = admin::remove(
            &backend,
            &email,
            settings.email_match,
            settings.page_size,
            self.dry_run,
        )
        .with_context(|| format!("cannot remove '{email}'"))?;

        let prefix = if removal.dry_run { "[dry-run] would remove" } else { "✓ Removed" };
        let profile = if removal.profile_deleted {
            "identity and profile"
        } else {
            "identity (no profile row)"
        };
        println!("{prefix} {profile} for '{}' ({})", removal.identity.email, removal.identity.id);
        Ok(())
    }
}
