//! `rostersync verify`: credential reset and sign-in self-test.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rostersync_sync::{verify, RunOptions, VerifyOutcome, VerifyStatus};

use super::{connect, load_roster_with, print_json, roster_path, separator, SettingsArgs};

/// Arguments for `rostersync verify`.
#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Roster file (default: ~/.rostersync/roster.yaml).
    pub roster: Option<PathBuf>,

    /// Only verify this roster entry.
    #[arg(long)]
    pub email: Option<String>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl VerifyArgs {
    pub fn run(self) -> Result<()> {
        let path = roster_path(self.roster.clone())?;
        let roster = load_roster_with(&path, &self.settings)?;
        let settings = &roster.settings;
        let options = RunOptions::from_settings(settings);

        let entries: Vec<_> = match &self.email {
            Some(email) => roster
                .entries
                .iter()
                .filter(|entry| entry.email.matches(email, options.email_match))
                .cloned()
                .collect(),
            None => roster.entries.clone(),
        };
        if entries.is_empty() {
            bail!(
                "no roster entry matches '{}'",
                self.email.as_deref().unwrap_or_default()
            );
        }

        let backend = connect(settings, true)?;
        let outcomes = verify::verify_all(&backend, &entries, &options);

        if self.json {
            return print_json(&outcomes);
        }
        print_outcomes(&outcomes);
        Ok(())
    }
}

#[derive(Tabled)]
struct VerifyRow {
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "identity")]
    identity: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_outcomes(outcomes: &[VerifyOutcome]) {
    let rows: Vec<VerifyRow> = outcomes
        .iter()
        .map(|outcome| VerifyRow {
            email: outcome.email.clone(),
            identity: outcome
                .identity_id
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string()),
            result: match &outcome.status {
                VerifyStatus::Verified { .. } => outcome.label().green().to_string(),
                VerifyStatus::IdentityMissing => outcome.label().yellow().to_string(),
                VerifyStatus::Failed { .. } => outcome.label().red().bold().to_string(),
            },
            detail: match &outcome.status {
                VerifyStatus::Failed { error, .. } => error.clone(),
                _ => String::new(),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let verified = outcomes
        .iter()
        .filter(|o| matches!(o.status, VerifyStatus::Verified { .. }))
        .count();
    let failed = outcomes.iter().filter(|o| o.is_failure()).count();
    println!("{}", separator());
    println!(
        "{} entries | {} verified | {} missing | {} failed",
        outcomes.len(),
        verified,
        outcomes.len() - verified - failed,
        failed
    );
}
