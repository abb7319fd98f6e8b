//! `rostersync inspect <email>`: read-only view of one identity.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rostersync_core::types::{ApprovalStatus, Email};
use rostersync_sync::admin::{self, Inspection};

use super::{connect, print_json, settings_for, SettingsArgs};

/// Arguments for `rostersync inspect`.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Email of the identity to show.
    pub email: String,

    /// Roster whose settings to use (default roster if present).
    #[arg(long)]
    pub roster: Option<PathBuf>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl InspectArgs {
    pub fn run(self) -> Result<()> {
        let settings = settings_for(self.roster.clone(), &self.settings)?;
        let backend = connect(&settings, false)?;
        let email = Email::from(self.email.as_str());

        let inspection = admin::inspect(&backend, &email, settings.email_match, settings.page_size)
            .with_context(|| format!("cannot inspect '{email}'"))?;

        if self.json {
            return print_json(&inspection);
        }
        print_inspection(&inspection);
        Ok(())
    }
}

fn print_inspection(inspection: &Inspection) {
    let identity = &inspection.identity;
    println!("{}", identity.email.bold());
    println!("  identity id:  {}", identity.id);
    println!(
        "  confirmed:    {}",
        if identity.email_confirmed {
            "yes".green()
        } else {
            "no".yellow()
        }
    );
    for (key, value) in &identity.metadata {
        println!("  meta {key}: {value}");
    }

    let Some(profile) = &inspection.profile else {
        println!("  profile:      {}", "none".yellow());
        return;
    };
    let status = profile.approval_status.to_string();
    let status = match profile.approval_status {
        ApprovalStatus::Approved => status.green(),
        ApprovalStatus::Pending => status.yellow(),
        ApprovalStatus::Rejected => status.red(),
    };
    println!("  profile:      {}", profile.full_name);
    println!("    status:     {status}");
    println!("    role:       {}", profile.role);
    println!("    branch:     {}", profile.branch);
    if let Some(at) = profile.approved_at {
        println!("    approved:   {}", at.to_rfc3339());
    }
    if let Some(at) = profile.created_at {
        println!("    created:    {}", at.to_rfc3339());
    }
}
