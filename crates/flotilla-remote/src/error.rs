//! Remote operation errors.

use thiserror::Error;

/// Errors scoped to a single node.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Dial, authentication or name resolution failure.
    #[error("cannot reach {host}: {reason}")]
    Connectivity { host: String, reason: String },

    /// The remote command ran and exited unsuccessfully.
    #[error("command failed on {host} ({status}): {detail}")]
    Command {
        host: String,
        status: String,
        detail: String,
    },

    #[error("transfer of {local} to {host}:{remote} failed: {reason}")]
    Transfer {
        host: String,
        local: String,
        remote: String,
        reason: String,
    },

    #[error("can't execute empty command")]
    EmptyCommand,

    #[error("i/o error while talking to {host}: {source}")]
    Io {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RemoteError::Connectivity { .. })
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;
