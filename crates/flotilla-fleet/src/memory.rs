//! In-memory fleet directory.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use flotilla_core::{Node, NodeId};

use crate::directory::FleetDirectory;
use crate::error::DirectoryError;

/// Directory held in memory. Every successful `set` is recorded.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    catalogue: Mutex<HashMap<NodeId, Node>>,
    groups: Mutex<HashMap<String, Vec<NodeId>>>,
    writes: Mutex<Vec<(String, Vec<NodeId>)>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `nodes` and attach them to `group`, in order.
    pub fn with_group(self, group: &str, nodes: Vec<Node>) -> Self {
        {
            let mut catalogue = self.catalogue.lock().unwrap_or_else(PoisonError::into_inner);
            let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
            let ids = nodes.iter().map(|n| n.id).collect();
            for node in nodes {
                catalogue.insert(node.id, node);
            }
            groups.insert(group.to_string(), ids);
        }
        self
    }

    /// Every `(group, ids)` passed to a successful `set_nodes_for_group`.
    pub fn writes(&self) -> Vec<(String, Vec<NodeId>)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FleetDirectory for MemoryDirectory {
    async fn get_nodes_for_group(&self, group: &str) -> Result<Vec<Node>, DirectoryError> {
        let catalogue = self.catalogue.lock().unwrap_or_else(PoisonError::into_inner);
        let groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        let ids = groups
            .get(group)
            .ok_or_else(|| DirectoryError::UnknownGroup(group.to_string()))?;
        ids.iter()
            .map(|id| {
                catalogue
                    .get(id)
                    .map(|n| Node::new(n.hostname.clone(), n.id))
                    .ok_or_else(|| DirectoryError::UnknownNode {
                        group: group.to_string(),
                        id: *id,
                    })
            })
            .collect()
    }

    async fn set_nodes_for_group(&self, group: &str, ids: &[NodeId]) -> Result<(), DirectoryError> {
        let catalogue = self.catalogue.lock().unwrap_or_else(PoisonError::into_inner);
        let mut groups = self.groups.lock().unwrap_or_else(PoisonError::into_inner);
        if !groups.contains_key(group) {
            return Err(DirectoryError::UnknownGroup(group.to_string()));
        }
        if let Some(id) = ids.iter().find(|id| !catalogue.contains_key(*id)) {
            return Err(DirectoryError::UnknownNode {
                group: group.to_string(),
                id: *id,
            });
        }
        groups.insert(group.to_string(), ids.to_vec());
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((group.to_string(), ids.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> MemoryDirectory {
        MemoryDirectory::new().with_group(
            "slice",
            vec![Node::new("a", 1), Node::new("b", 2), Node::new("c", 3)],
        )
    }

    #[tokio::test]
    async fn get_returns_group_in_order() {
        let nodes = directory().get_nodes_for_group("slice").await.unwrap();
        assert_eq!(nodes.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn set_is_recorded_and_applied() {
        let dir = directory();
        dir.set_nodes_for_group("slice", &[1, 3]).await.unwrap();
        assert_eq!(dir.writes(), vec![("slice".to_string(), vec![1, 3])]);
        assert_eq!(dir.get_nodes_for_group("slice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn set_on_unknown_group_fails() {
        let err = directory().set_nodes_for_group("other", &[1]).await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownGroup(_)));
    }
}
