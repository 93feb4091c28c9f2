//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or validating deploy inputs.
///
/// All of these are fatal and are raised before any remote work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("not a git repository url (expected a .git suffix): {0}")]
    InvalidGitUrl(String),

    #[error("badly formatted override string {0:?}, expected VAR1=VAL1,VAR2=VAL2")]
    MalformedOverride(String),

    #[error("{0:?} is not a valid environment variable name")]
    InvalidEnvName(String),

    #[error("no manifest {file} in repository {url}")]
    MissingManifest { url: String, file: String },

    #[error("malformed manifest: {0}")]
    MalformedManifest(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot determine home directory")]
    NoHomeDir,

    #[error("git {operation} failed for {url}: {reason}")]
    Git {
        operation: &'static str,
        url: String,
        reason: String,
    },
}
