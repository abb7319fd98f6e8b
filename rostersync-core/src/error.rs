//! Error types for rostersync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading, validating, or saving a roster.
#[derive(Debug, Error)]
pub enum RosterError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse roster at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The roster file did not exist at the expected path.
    #[error("roster not found at {path}")]
    RosterNotFound { path: PathBuf },

    /// The roster file was written for a format version this build cannot read.
    #[error("unsupported roster version {found}; expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// One or more entries failed validation.
    #[error("invalid roster: {}", problems.join("; "))]
    Invalid { problems: Vec<String> },

    /// `password_env` names a variable that is unset or empty.
    #[error("credential variable {var} is not set")]
    UnresolvedCredential { var: String },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.rostersync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Errors raised while reading process configuration. These are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    /// An environment variable is set but its value cannot be used.
    #[error("invalid value for {name}: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    /// A `.env` file exists but could not be read.
    #[error("failed to load .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
}
