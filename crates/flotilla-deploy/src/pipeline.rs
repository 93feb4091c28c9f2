//! The deployment pipeline: manifest, resolution, bootstrap, host table,
//! launch and the optional service-discovery export.

use std::sync::Arc;
use std::time::{Duration, Instant};

use flotilla_core::{Node, hostname_list};
use flotilla_dispatch::Dispatcher;
use flotilla_fleet::FleetDirectory;
use flotilla_health::{HealthEvaluator, HealthReport, ProbeSettings};
use flotilla_remote::Transport;
use tracing::info;

use crate::bootstrap::bootstrap_nodes;
use crate::discovery::{target_groups, write_targets};
use crate::error::DeployResult;
use crate::hosts::{HostTable, distribute};
use crate::launch::launch_instances;
use crate::manifest::{GitManifestSource, ManifestSource};
use crate::plan::{DeployRequest, DeploymentPlan};
use crate::resolver::{AddressResolver, DnsResolver};
use crate::selector::NodeSelector;

/// Summary of a finished deployment.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub nodes: Vec<Node>,
    pub instances: usize,
    pub elapsed: Duration,
    /// Present unless the health check was skipped.
    pub health: Option<HealthReport>,
    pub hosts: HostTable,
}

/// Drives one deployment run against the fleet.
pub struct Pipeline {
    transport: Transport,
    directory: Arc<dyn FleetDirectory>,
    manifests: Arc<dyn ManifestSource>,
    resolver: Arc<dyn AddressResolver>,
    dispatcher: Dispatcher,
    probe: ProbeSettings,
}

impl Pipeline {
    pub fn new(transport: Transport, directory: Arc<dyn FleetDirectory>, dispatcher: Dispatcher) -> Self {
        Self {
            transport,
            directory,
            manifests: Arc::new(GitManifestSource),
            resolver: Arc::new(DnsResolver),
            dispatcher,
            probe: ProbeSettings::default(),
        }
    }

    pub fn with_manifest_source(mut self, manifests: Arc<dyn ManifestSource>) -> Self {
        self.manifests = manifests;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn AddressResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_probe_settings(mut self, probe: ProbeSettings) -> Self {
        self.probe = probe;
        self
    }

    /// Run every phase in order. The first failing phase ends the run.
    pub async fn deploy(&self, request: &DeployRequest) -> DeployResult<DeployReport> {
        let started = Instant::now();
        let (app, overrides) = request.validate()?;
        info!(
            url = %app.url,
            group = %request.group,
            nodes = request.node_count,
            instances = request.instance_count(),
            "initiating deployment"
        );

        let manifest = self.manifests.fetch(&app, &request.branch).await?;

        let (candidates, health) = self.candidates(request).await?;
        let selector = NodeSelector::new()
            .with_blacklist(request.blacklist.clone())
            .with_shuffle(request.shuffle_nodes, request.seed);
        let nodes = selector.select(candidates, request.node_count)?;
        info!("nodes that will be used for deployment: {}", hostname_list(&nodes));

        let plan = DeploymentPlan::new(request, app, overrides, nodes, manifest);

        bootstrap_nodes(&self.transport, &self.dispatcher, &plan).await?;

        let hosts = HostTable::build(&plan, self.resolver.as_ref()).await?;
        distribute(&self.transport, &self.dispatcher, &plan, &hosts).await?;
        if let Some(path) = &request.hosts_file {
            hosts.write_local(path).await?;
        }

        let instances = launch_instances(&self.transport, &self.dispatcher, &plan, request.seed).await?;

        if let Some(path) = &request.sd_path {
            write_targets(path, &target_groups(&plan)).await?;
        }

        let elapsed = started.elapsed();
        info!(
            instances,
            nodes = plan.nodes.len(),
            ?elapsed,
            "deployment finished"
        );
        Ok(DeployReport {
            nodes: plan.nodes,
            instances,
            elapsed,
            health,
            hosts,
        })
    }

    async fn candidates(&self, request: &DeployRequest) -> DeployResult<(Vec<Node>, Option<HealthReport>)> {
        if request.skip_health_check {
            info!(group = %request.group, "skipping health check of nodes");
            let nodes = self.directory.get_nodes_for_group(&request.group).await?;
            return Ok((nodes, None));
        }

        let evaluator = HealthEvaluator::new(
            self.transport.clone(),
            Arc::clone(&self.directory),
            self.dispatcher,
        )
        .with_settings(self.probe.clone());
        let report = evaluator.check_group(&request.group, false).await?;
        Ok((report.healthy.clone(), Some(report)))
    }
}
