//! The fleet directory contract.

use async_trait::async_trait;
use flotilla_core::{Node, NodeId};

use crate::error::DirectoryError;

/// Membership service keyed by node group name.
#[async_trait]
pub trait FleetDirectory: Send + Sync {
    /// Nodes currently attached to `group`, health `Unknown`.
    async fn get_nodes_for_group(&self, group: &str) -> Result<Vec<Node>, DirectoryError>;

    /// Replace the membership of `group` with exactly `ids`.
    async fn set_nodes_for_group(&self, group: &str, ids: &[NodeId]) -> Result<(), DirectoryError>;
}
