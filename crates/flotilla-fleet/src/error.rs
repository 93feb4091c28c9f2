//! Fleet directory errors.

use std::path::PathBuf;

use flotilla_core::NodeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("unknown node group: {0}")]
    UnknownGroup(String),

    #[error("unknown node id {id} for group {group}")]
    UnknownNode { group: String, id: NodeId },

    #[error("directory file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed directory file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}
