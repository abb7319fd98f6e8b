//! Roster files.
//!
//! # Storage layout
//!
//! ```text
//! ~/.rostersync/
//!   roster.yaml     (default roster, mode 0600, may hold credentials)
//! ```
//!
//! Any other path may be passed explicitly. Every function that touches the
//! default location has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::RosterError;
use crate::types::{Credential, Roster, RosterEntry, RosterSettings};

/// The only roster format version this build reads.
pub const ROSTER_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.rostersync/roster.yaml`. Pure, no I/O.
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".rostersync").join("roster.yaml")
}

/// `default_path_at` convenience wrapper.
pub fn default_path() -> Result<PathBuf, RosterError> {
    Ok(default_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 2. Load + validate
// ---------------------------------------------------------------------------

/// Parse a roster file without validating its entries.
///
/// Returns `RosterError::RosterNotFound` if absent,
/// `RosterError::Parse` (with path + line context) if malformed YAML.
pub fn read(path: &Path) -> Result<Roster, RosterError> {
    if !path.exists() {
        return Err(RosterError::RosterNotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&contents).map_err(|e| RosterError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse and validate a roster file. This is what every run starts with.
pub fn load(path: &Path) -> Result<Roster, RosterError> {
    let roster = read(path)?;
    validate(&roster)?;
    Ok(roster)
}

/// Check the structural rules a roster must satisfy before a run.
///
/// All problems are collected so a single pass reports every bad entry.
pub fn validate(roster: &Roster) -> Result<(), RosterError> {
    if roster.version != ROSTER_VERSION {
        return Err(RosterError::UnsupportedVersion {
            found: roster.version,
            expected: ROSTER_VERSION,
        });
    }

    let mut problems = settings_problems(&roster.settings);
    if roster.entries.is_empty() {
        problems.push("roster has no entries".to_string());
    }

    let mut seen = HashSet::new();
    for (index, entry) in roster.entries.iter().enumerate() {
        let label = format!("entry {} ({})", index + 1, entry.email);
        problems.extend(entry_problems(entry).into_iter().map(|p| format!("{label}: {p}")));
        if !seen.insert(entry.email.normalized(roster.settings.email_match)) {
            problems.push(format!("{label}: duplicate email"));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(RosterError::Invalid { problems })
    }
}

/// Check settings on their own, for commands that run without entries.
pub fn validate_settings(settings: &RosterSettings) -> Result<(), RosterError> {
    let problems = settings_problems(settings);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(RosterError::Invalid { problems })
    }
}

/// Replace the settings of a loaded roster and validate it again.
///
/// Duplicate detection depends on `email_match`, so a roster that passed
/// under its own settings can fail under overridden ones.
pub fn with_settings(mut roster: Roster, settings: RosterSettings) -> Result<Roster, RosterError> {
    roster.settings = settings;
    validate(&roster)?;
    Ok(roster)
}

fn settings_problems(settings: &RosterSettings) -> Vec<String> {
    let mut problems = Vec::new();
    if settings.profile_table.trim().is_empty() {
        problems.push("settings.profile_table is empty".to_string());
    }
    if settings.page_size == 0 {
        problems.push("settings.page_size must be at least 1".to_string());
    }
    problems
}

fn entry_problems(entry: &RosterEntry) -> Vec<String> {
    let mut problems = Vec::new();
    let email = entry.email.as_str();
    if email.trim().is_empty() {
        problems.push("email is empty".to_string());
    } else if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        problems.push("email is not an address".to_string());
    }
    if entry.display_name.trim().is_empty() {
        problems.push("display_name is empty".to_string());
    }
    if entry.branch.0.trim().is_empty() {
        problems.push("branch is empty".to_string());
    }
    if entry.role.0.trim().is_empty() {
        problems.push("role is empty".to_string());
    }
    match &entry.credential {
        Credential::Password(secret) if secret.expose().is_empty() => {
            problems.push("password is empty".to_string());
        }
        Credential::PasswordEnv(name) if name.trim().is_empty() => {
            problems.push("password_env is empty".to_string());
        }
        _ => {}
    }
    problems
}

/// Names of `password_env` variables that `lookup` cannot resolve.
///
/// Not a validation failure: the variables only need to exist at run time.
pub fn unresolved_credentials<F>(roster: &Roster, lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    roster
        .entries
        .iter()
        .filter_map(|entry| match &entry.credential {
            Credential::PasswordEnv(name) if entry.credential.resolve_with(&lookup).is_err() => {
                Some(name.clone())
            }
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a roster to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target.
pub fn save(path: &Path, roster: &Roster) -> Result<(), RosterError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)?;
            set_dir_permissions(dir)?;
        }
    }
    let tmp_path = tmp_path_for(path);

    let yaml = serde_yaml::to_string(roster)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "roster.yaml".to_string());
    path.with_file_name(format!("{name}.tmp"))
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// A starter roster with one entry whose password is read from the environment.
pub fn template() -> Roster {
    use crate::types::{Branch, Email, Role};

    Roster {
        version: ROSTER_VERSION,
        settings: RosterSettings::default(),
        entries: vec![RosterEntry {
            email: Email::from("staff@example.com"),
            display_name: "Example Staff".to_string(),
            credential: Credential::PasswordEnv("ROSTER_STAFF_PASSWORD".to_string()),
            branch: Branch::from("HQ"),
            role: Role::from("staff"),
        }],
    }
}

/// Write the starter roster to `path`.
///
/// Idempotent: if the file already exists, loads and returns it unchanged.
/// Returns the roster and whether it was newly written.
pub fn init(path: &Path) -> Result<(Roster, bool), RosterError> {
    if path.exists() {
        return Ok((read(path)?, false));
    }
    let roster = template();
    save(path, &roster)?;
    Ok((roster, true))
}

/// `init` at the default location under `home`.
pub fn init_at(home: &Path) -> Result<(PathBuf, Roster, bool), RosterError> {
    let path = default_path_at(home);
    let (roster, created) = init(&path)?;
    Ok((path, roster, created))
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, RosterError> {
    dirs::home_dir().ok_or(RosterError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RosterError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RosterError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RosterError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RosterError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
