//! TOML-file-backed fleet directory.
//!
//! ```toml
//! [[nodes]]
//! hostname = "planetlab1.example.org"
//! id = 101
//!
//! [[nodes]]
//! hostname = "planetlab2.example.org"
//! id = 102
//!
//! [groups]
//! chalmers_slice = [101, 102]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use flotilla_core::{Node, NodeId};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::directory::FleetDirectory;
use crate::error::DirectoryError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
struct DirectoryFile {
    #[serde(default)]
    nodes: Vec<NodeEntry>,
    #[serde(default)]
    groups: BTreeMap<String, Vec<NodeId>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct NodeEntry {
    hostname: String,
    id: NodeId,
}

impl DirectoryFile {
    fn catalogue(&self) -> HashMap<NodeId, &NodeEntry> {
        self.nodes.iter().map(|n| (n.id, n)).collect()
    }
}

/// Directory persisted as a TOML file. Updates rewrite the whole file.
pub struct FileDirectory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<DirectoryFile, DirectoryError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| DirectoryError::Io {
                path: self.path.clone(),
                source,
            })?;
        toml::from_str(&content).map_err(|e| DirectoryError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    async fn store(&self, file: &DirectoryFile) -> Result<(), DirectoryError> {
        let content = toml::to_string_pretty(file).map_err(|e| DirectoryError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|source| DirectoryError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[async_trait]
impl FleetDirectory for FileDirectory {
    async fn get_nodes_for_group(&self, group: &str) -> Result<Vec<Node>, DirectoryError> {
        let file = self.load().await?;
        let ids = file
            .groups
            .get(group)
            .ok_or_else(|| DirectoryError::UnknownGroup(group.to_string()))?;
        let catalogue = file.catalogue();

        let mut nodes = Vec::with_capacity(ids.len());
        for id in ids {
            let entry = catalogue.get(id).ok_or_else(|| DirectoryError::UnknownNode {
                group: group.to_string(),
                id: *id,
            })?;
            nodes.push(Node::new(entry.hostname.clone(), entry.id));
        }
        debug!(group, count = nodes.len(), path = %self.path.display(), "loaded group members");
        Ok(nodes)
    }

    async fn set_nodes_for_group(&self, group: &str, ids: &[NodeId]) -> Result<(), DirectoryError> {
        let _guard = self.write_lock.lock().await;
        let mut file = self.load().await?;
        if !file.groups.contains_key(group) {
            return Err(DirectoryError::UnknownGroup(group.to_string()));
        }
        let catalogue = file.catalogue();
        if let Some(id) = ids.iter().find(|id| !catalogue.contains_key(*id)) {
            return Err(DirectoryError::UnknownNode {
                group: group.to_string(),
                id: *id,
            });
        }

        file.groups.insert(group.to_string(), ids.to_vec());
        self.store(&file).await?;
        info!(group, count = ids.len(), "group membership updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[nodes]]
hostname = "a.example.org"
id = 1

[[nodes]]
hostname = "b.example.org"
id = 2

[[nodes]]
hostname = "c.example.org"
id = 3

[groups]
slice = [3, 1, 2]
empty = []
"#;

    fn sample_dir() -> (tempfile::TempDir, FileDirectory) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        (dir, FileDirectory::new(path))
    }

    #[tokio::test]
    async fn group_members_keep_listed_order() {
        let (_tmp, directory) = sample_dir();
        let nodes = directory.get_nodes_for_group("slice").await.unwrap();
        let hosts: Vec<&str> = nodes.iter().map(|n| n.hostname.as_str()).collect();
        assert_eq!(hosts, vec!["c.example.org", "a.example.org", "b.example.org"]);
        assert!(directory.get_nodes_for_group("empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_group_is_an_error() {
        let (_tmp, directory) = sample_dir();
        let err = directory.get_nodes_for_group("nope").await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownGroup(_)));
    }

    #[tokio::test]
    async fn set_replaces_membership_and_persists() {
        let (_tmp, directory) = sample_dir();
        directory.set_nodes_for_group("slice", &[1, 3]).await.unwrap();

        let reopened = FileDirectory::new(directory.path());
        let ids: Vec<NodeId> = reopened
            .get_nodes_for_group("slice")
            .await
            .unwrap()
            .iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn set_rejects_unknown_ids() {
        let (_tmp, directory) = sample_dir();
        let err = directory.set_nodes_for_group("slice", &[1, 99]).await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownNode { id: 99, .. }));
        assert_eq!(directory.get_nodes_for_group("slice").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.toml");
        std::fs::write(&path, "[[nodes]]\nhostname = 5\n").unwrap();
        let err = FileDirectory::new(path)
            .get_nodes_for_group("slice")
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Parse { .. }));
    }

    #[tokio::test]
    async fn missing_file_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileDirectory::new(dir.path().join("absent.toml"))
            .get_nodes_for_group("slice")
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Io { .. }));
    }
}
