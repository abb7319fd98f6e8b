//! `rostersync reconcile`: create, update, or skip profiles for every entry.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use rostersync_sync::{
    pipeline, Compensation, EntryOutcome, EntryStatus, IdentityAction, RunOptions, RunReport,
    RunSummary,
};

use super::{connect, load_roster_with, print_json, roster_path, separator, SettingsArgs};

/// Arguments for `rostersync reconcile`.
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Roster file (default: ~/.rostersync/roster.yaml).
    pub roster: Option<PathBuf>,

    /// Resolve and read only; print what would be written.
    #[arg(long)]
    pub dry_run: bool,

    /// Create identities for entries that have none.
    #[arg(long)]
    pub create_missing: bool,

    /// Overwrite password, confirmation, and metadata of existing identities.
    #[arg(long)]
    pub reset_credentials: bool,

    /// Pause between entries, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ReconcileArgs {
    pub fn run(self) -> Result<()> {
        let path = roster_path(self.roster.clone())?;
        let roster = load_roster_with(&path, &self.settings)?;
        let mut settings = roster.settings.clone();
        if let Some(delay) = self.delay_ms {
            settings.delay_ms = delay;
        }
        let backend = connect(&settings, false)?;

        let options = RunOptions {
            dry_run: self.dry_run,
            create_missing: self.create_missing,
            reset_credentials: self.reset_credentials,
            ..RunOptions::from_settings(&settings)
        };
        let report = pipeline::run(&backend, &roster.entries, &options, Utc::now());

        if self.json {
            return print_json(&ReportJson {
                summary: report.summary(),
                report: &report,
            });
        }
        print_report(&report);
        Ok(())
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    summary: RunSummary,
    #[serde(flatten)]
    report: &'a RunReport,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "identity")]
    identity: String,
    #[tabled(rename = "result")]
    result: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let summary = report.summary();

    if report.entries.is_empty() {
        println!("{prefix}Roster has no entries.");
        return;
    }

    let rows: Vec<ReportRow> = report.entries.iter().map(row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{}", separator());
    println!("{prefix}{}", summary_line(&summary));

    if summary.missing > 0 && !report.dry_run {
        println!("Run with --create-missing to create identities for missing entries.");
    }
}

fn row(outcome: &EntryOutcome) -> ReportRow {
    let identity = match (&outcome.status, &outcome.identity_id) {
        (EntryStatus::Reconciled { identity, .. }, Some(id)) => {
            format!("{id} ({})", identity_label(*identity))
        }
        (EntryStatus::Reconciled { identity, .. }, None) => identity_label(*identity).to_string(),
        (_, Some(id)) => id.to_string(),
        (_, None) => "-".to_string(),
    };
    ReportRow {
        email: outcome.email.clone(),
        identity,
        result: colored_label(outcome),
        detail: detail(outcome),
    }
}

fn identity_label(action: IdentityAction) -> &'static str {
    match action {
        IdentityAction::Existing => "existing",
        IdentityAction::Created => "created",
        IdentityAction::CredentialsReset => "credentials reset",
        IdentityAction::WouldCreate => "would create",
        IdentityAction::WouldResetCredentials => "would reset",
    }
}

fn colored_label(outcome: &EntryOutcome) -> String {
    let label = outcome.label();
    match &outcome.status {
        EntryStatus::Reconciled { profile, .. } if profile.is_write() => label.green().to_string(),
        EntryStatus::Reconciled { .. } => label.normal().to_string(),
        EntryStatus::IdentityMissing => label.yellow().to_string(),
        EntryStatus::Failed { .. } => label.red().bold().to_string(),
    }
}

fn detail(outcome: &EntryOutcome) -> String {
    match &outcome.status {
        EntryStatus::Failed {
            error,
            compensation,
            ..
        } => match compensation {
            None => error.clone(),
            Some(Compensation::IdentityDeleted) => format!("{error}; identity deleted"),
            Some(Compensation::DeleteFailed { error: delete }) => {
                format!("{error}; identity NOT deleted: {delete}")
            }
        },
        _ => String::new(),
    }
}

fn summary_line(summary: &RunSummary) -> String {
    let failed = format!("{} failed", summary.failed);
    let failed = if summary.failed > 0 {
        failed.red().bold().to_string()
    } else {
        failed
    };
    format!(
        "{} entries | {} created | {} updated | {} unchanged | {} planned | {} missing | {}",
        summary.total,
        summary.created,
        summary.updated,
        summary.unchanged,
        summary.planned,
        summary.missing,
        failed,
    )
}
