//! `rostersync roster init` and `rostersync roster check`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use rostersync_core::{config, roster, types::Credential, Roster};

use super::{load_roster, roster_path};

/// Create or validate roster files.
#[derive(Subcommand, Debug)]
pub enum RosterCommand {
    /// Write a starter roster (never overwrites an existing file).
    Init(InitArgs),

    /// Parse and validate a roster and list its entries.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write it (default: ~/.rostersync/roster.yaml).
    pub path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Roster file (default: ~/.rostersync/roster.yaml).
    pub roster: Option<PathBuf>,
}

pub fn run(cmd: RosterCommand) -> Result<()> {
    match cmd {
        RosterCommand::Init(args) => init(args),
        RosterCommand::Check(args) => check(args),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let path = roster_path(args.path)?;
    let (_, created) = roster::init(&path)
        .with_context(|| format!("failed to init roster at '{}'", path.display()))?;

    if created {
        println!("✓ Wrote starter roster to {}", path.display());
        println!("  Edit the entries, then run: rostersync roster check");
    } else {
        println!("✓ Roster already exists at {} (left unchanged)", path.display());
    }
    Ok(())
}

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "email")]
    email: String,
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "role")]
    role: String,
    #[tabled(rename = "branch")]
    branch: String,
    #[tabled(rename = "credential")]
    credential: String,
}

fn check(args: CheckArgs) -> Result<()> {
    let path = roster_path(args.roster)?;
    let roster = load_roster(&path)?;

    println!(
        "✓ {} is valid: {} entries | table '{}' keyed by {} | email match {}",
        path.display(),
        roster.entries.len(),
        roster.settings.profile_table,
        roster.settings.profile_key,
        roster.settings.email_match,
    );
    print_entries(&roster);

    config::load_dotenv().context("failed to load .env")?;
    for var in roster::unresolved_credentials(&roster, |name| std::env::var(name).ok()) {
        println!(
            "{} password variable {var} is not set in this environment",
            "warning:".yellow().bold()
        );
    }
    Ok(())
}

fn print_entries(roster: &Roster) {
    let rows: Vec<EntryRow> = roster
        .entries
        .iter()
        .map(|entry| EntryRow {
            email: entry.email.to_string(),
            name: entry.display_name.clone(),
            role: entry.role.to_string(),
            branch: entry.branch.to_string(),
            credential: match &entry.credential {
                Credential::Password(_) => "inline".to_string(),
                Credential::PasswordEnv(var) => format!("${var}"),
            },
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
