//! rostersync: reconcile a staff roster against a Supabase project.
//!
//! # Usage
//!
//! ```text
//! rostersync reconcile [ROSTER] [--dry-run] [--create-missing] [--reset-credentials] [--json]
//! rostersync verify [ROSTER] [--email <email>] [--json]
//! rostersync inspect <email> [--roster <path>] [--json]
//! rostersync remove <email> --confirm [--dry-run]
//! rostersync roster init [PATH]
//! rostersync roster check [ROSTER]
//! ```
//!
//! `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY` are read from the
//! environment or a `.env` file; `verify` also needs `SUPABASE_ANON_KEY`.

mod commands;

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    inspect::InspectArgs, reconcile::ReconcileArgs, remove::RemoveArgs, roster::RosterCommand,
    verify::VerifyArgs,
};
use rostersync_core::types::{EmailMatch, ProfileKey};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "rostersync",
    version,
    about = "Reconcile staff accounts and profiles against a Supabase project",
    long_about = None,
)]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring every roster entry's identity and profile in line with the roster.
    Reconcile(ReconcileArgs),

    /// Reset each entry's password, then sign in with it and read the profile.
    Verify(VerifyArgs),

    /// Show one identity and its profile row.
    Inspect(InspectArgs),

    /// Delete one identity and its profile row.
    Remove(RemoveArgs),

    /// Create or validate roster files. No network access.
    Roster {
        #[command(subcommand)]
        command: RosterCommand,
    },
}

// ---------------------------------------------------------------------------
// Shared setting arguments, parsed from CLI strings into core types
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse `EmailMatch` from CLI args.
#[derive(Debug, Clone)]
pub struct EmailMatchArg(pub EmailMatch);

impl FromStr for EmailMatchArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "exact" => Ok(Self(EmailMatch::Exact)),
            "case_insensitive" => Ok(Self(EmailMatch::CaseInsensitive)),
            other => Err(format!(
                "unknown email match mode '{other}'; expected: exact, case_insensitive"
            )),
        }
    }
}

impl fmt::Display for EmailMatchArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Thin wrapper so clap can parse `ProfileKey` from CLI args.
#[derive(Debug, Clone)]
pub struct ProfileKeyArg(pub ProfileKey);

impl FromStr for ProfileKeyArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "id" => Ok(Self(ProfileKey::Id)),
            "user_id" => Ok(Self(ProfileKey::UserId)),
            other => Err(format!(
                "unknown profile key '{other}'; expected: id, user_id"
            )),
        }
    }
}

impl fmt::Display for ProfileKeyArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Reconcile(args) => args.run(),
        Commands::Verify(args) => args.run(),
        Commands::Inspect(args) => args.run(),
        Commands::Remove(args) => args.run(),
        Commands::Roster { command } => commands::roster::run(command),
    }
}
