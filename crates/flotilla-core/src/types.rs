//! Domain types shared by every flotilla crate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Numeric node identifier assigned by the fleet directory.
pub type NodeId = u64;

/// Default number of concurrent workers per dispatcher run.
pub const DEFAULT_WORKERS: usize = 10;

/// Default remote control (ssh) port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Health classification of a node within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Unknown,
    Healthy,
    Faulty,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Unknown => write!(f, "unknown"),
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Faulty => write!(f, "faulty"),
        }
    }
}

/// A testbed machine. Identity is the hostname.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    pub id: NodeId,
    #[serde(skip)]
    pub health: HealthStatus,
}

impl Node {
    pub fn new(hostname: impl Into<String>, id: NodeId) -> Self {
        Self {
            hostname: hostname.into(),
            id,
            health: HealthStatus::Unknown,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.hostname == other.hostname
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.hostname, self.id)
    }
}

/// Join hostnames for log output: `a, b and c`.
pub fn hostname_list(nodes: &[Node]) -> String {
    match nodes {
        [] => String::new(),
        [only] => only.hostname.clone(),
        [rest @ .., last] => {
            let head: Vec<&str> = rest.iter().map(|n| n.hostname.as_str()).collect();
            format!("{} and {}", head.join(", "), last.hostname)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_compare_by_hostname() {
        let mut a = Node::new("a.example.org", 1);
        let b = Node::new("a.example.org", 2);
        a.health = HealthStatus::Healthy;
        assert_eq!(a, b);
        assert_ne!(a, Node::new("b.example.org", 1));
    }

    #[test]
    fn new_node_is_unknown() {
        assert_eq!(Node::new("x", 7).health, HealthStatus::Unknown);
    }

    #[test]
    fn hostname_list_formats() {
        let nodes = vec![Node::new("a", 1), Node::new("b", 2), Node::new("c", 3)];
        assert_eq!(hostname_list(&nodes), "a, b and c");
        assert_eq!(hostname_list(&nodes[..1]), "a");
        assert_eq!(hostname_list(&nodes[..2]), "a and b");
        assert_eq!(hostname_list(&[]), "");
    }

    #[test]
    fn display_includes_id() {
        assert_eq!(Node::new("n1.example.org", 42).to_string(), "n1.example.org [42]");
    }
}
