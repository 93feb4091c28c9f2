//! Candidate node narrowing.

use flotilla_core::Node;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};

/// Blacklist removal, optional shuffle, truncation.
#[derive(Debug, Clone, Default)]
pub struct NodeSelector {
    /// Hostnames removed by exact match.
    pub blacklist: Vec<String>,
    pub shuffle: bool,
    /// Shuffle seed; `None` seeds from system entropy.
    pub seed: Option<u64>,
}

impl NodeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool, seed: Option<u64>) -> Self {
        self.shuffle = shuffle;
        self.seed = seed;
        self
    }

    /// Pick `count` nodes out of `nodes`.
    pub fn select(&self, nodes: Vec<Node>, count: usize) -> DeployResult<Vec<Node>> {
        let before = nodes.len();
        let mut candidates: Vec<Node> = nodes
            .into_iter()
            .filter(|n| !self.blacklist.iter().any(|b| *b == n.hostname))
            .collect();
        if candidates.len() != before {
            info!(
                removed = before - candidates.len(),
                blacklist = ?self.blacklist,
                "removed blacklisted nodes"
            );
        }

        if candidates.len() < count {
            return Err(DeployError::ResourceInsufficient {
                found: candidates.len(),
                requested: count,
            });
        }

        if self.shuffle {
            debug!(seed = ?self.seed, "shuffling nodes");
            shuffle(&mut candidates, self.seed);
        }
        candidates.truncate(count);
        Ok(candidates)
    }
}

/// Uniform Fisher–Yates permutation.
pub(crate) fn shuffle<T>(items: &mut [T], seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    items.shuffle(&mut rng);
}
