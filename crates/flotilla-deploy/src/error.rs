//! Deployment errors.

use std::fmt;
use std::path::PathBuf;

use flotilla_core::ConfigError;
use flotilla_fleet::DirectoryError;
use flotilla_health::HealthError;
use thiserror::Error;

/// A phase-fatal or run-fatal deployment error.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("could not find enough nodes: found {found}/{requested}, run a health check to learn more")]
    ResourceInsufficient { found: usize, requested: usize },

    #[error("{phase} failed on {failed}/{total} job(s):{}", FailureList(.failures))]
    PhaseFailed {
        phase: &'static str,
        failed: usize,
        total: usize,
        /// `(hostname, message)` per failed job.
        failures: Vec<(String, String)>,
    },

    #[error("could not resolve address of {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Health(#[from] HealthError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DeployError::Io {
            path: path.into(),
            source,
        }
    }
}

struct FailureList<'a>(&'a [(String, String)]);

impl fmt::Display for FailureList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (host, message) in self.0 {
            write!(f, "\n  {host}: {message}")?;
        }
        Ok(())
    }
}

pub type DeployResult<T> = Result<T, DeployError>;
