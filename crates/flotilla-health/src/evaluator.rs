//! Group-wide health evaluation on top of the dispatcher.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use flotilla_core::{HealthStatus, Node, NodeId};
use flotilla_dispatch::{Dispatcher, Job, JobError};
use flotilla_fleet::FleetDirectory;
use flotilla_remote::Transport;
use tracing::{info, warn};

use crate::error::HealthResult;
use crate::probe::{ProbeSettings, ProbeStep, probe_node};

const PROBE_SCRIPT: &str = include_str!("../scripts/probe.sh");

/// A node classified faulty, with the step that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultyNode {
    pub node: Node,
    /// `None` when the probe itself crashed.
    pub step: Option<ProbeStep>,
    pub reason: String,
}

/// Healthy/faulty partition, both sides in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: Vec<Node>,
    pub faulty: Vec<FaultyNode>,
}

impl HealthReport {
    pub fn healthy_count(&self) -> usize {
        self.healthy.len()
    }

    pub fn faulty_count(&self) -> usize {
        self.faulty.len()
    }

    pub fn healthy_ids(&self) -> Vec<NodeId> {
        self.healthy.iter().map(|n| n.id).collect()
    }

    pub fn all_healthy(&self) -> bool {
        self.faulty.is_empty()
    }
}

/// Probes nodes concurrently and classifies them.
pub struct HealthEvaluator {
    transport: Transport,
    directory: Arc<dyn FleetDirectory>,
    dispatcher: Dispatcher,
    settings: ProbeSettings,
}

impl HealthEvaluator {
    pub fn new(
        transport: Transport,
        directory: Arc<dyn FleetDirectory>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            transport,
            directory,
            dispatcher,
            settings: ProbeSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ProbeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    /// Probe every node in one dispatcher run.
    ///
    /// Each node's `health` is set to its terminal classification.
    pub async fn evaluate(&self, nodes: Vec<Node>) -> HealthResult<HealthReport> {
        if nodes.is_empty() {
            return Ok(HealthReport::default());
        }

        // Kept alive until every probe has finished.
        let staged = stage_probe_script()?;
        let script: Arc<PathBuf> = Arc::new(staged.path().to_path_buf());
        let settings = Arc::new(self.settings.clone());
        let transport = self.transport.clone();

        info!(nodes = nodes.len(), "starting health check");
        let jobs = Job::per_node(&nodes);
        let dispatched = self
            .dispatcher
            .run("health-check", jobs, move |job| {
                let transport = transport.clone();
                let settings = Arc::clone(&settings);
                let script = Arc::clone(&script);
                async move { probe_node(&job.node, &transport, &settings, &script).await }
            })
            .await;

        let mut report = HealthReport::default();
        for result in dispatched.into_ordered() {
            let mut node = result.node;
            match result.outcome {
                Ok(()) => {
                    node.health = HealthStatus::Healthy;
                    report.healthy.push(node);
                }
                Err(JobError::Failed(failure)) => {
                    node.health = HealthStatus::Faulty;
                    report.faulty.push(FaultyNode {
                        node,
                        step: Some(failure.step),
                        reason: failure.reason,
                    });
                }
                Err(JobError::Panicked(reason)) => {
                    node.health = HealthStatus::Faulty;
                    report.faulty.push(FaultyNode {
                        node,
                        step: None,
                        reason,
                    });
                }
            }
        }

        info!(
            healthy = report.healthy_count(),
            faulty = report.faulty_count(),
            "health check finished"
        );
        Ok(report)
    }

    /// Evaluate the nodes of `group`.
    ///
    /// With `remove_faulty`, the group membership is replaced by the healthy
    /// nodes, unless no node was faulty.
    pub async fn check_group(&self, group: &str, remove_faulty: bool) -> HealthResult<HealthReport> {
        let nodes = self.directory.get_nodes_for_group(group).await?;
        let report = self.evaluate(nodes).await?;

        if remove_faulty && !report.all_healthy() {
            let ids = report.healthy_ids();
            warn!(
                %group,
                removed = report.faulty_count(),
                remaining = ids.len(),
                "removing faulty nodes from group"
            );
            self.directory.set_nodes_for_group(group, &ids).await?;
        }
        Ok(report)
    }
}

fn stage_probe_script() -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("flotilla_probe")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(PROBE_SCRIPT.as_bytes())?;
    file.flush()?;
    Ok(file)
}
