//! Health evaluation errors.

use flotilla_fleet::DirectoryError;
use thiserror::Error;

/// Errors that abort a whole health evaluation. Individual node failures
/// are never errors; they classify the node as faulty.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("fleet directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("failed to stage probe script: {0}")]
    ProbeScript(#[from] std::io::Error),
}

pub type HealthResult<T> = Result<T, HealthError>;
