//! Host table: one row per planned instance, shared with every node.

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use flotilla_dispatch::{Dispatcher, Job};
use flotilla_remote::{RemoteError, Transport};
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::phase::settle;
use crate::plan::DeploymentPlan;
use crate::resolver::AddressResolver;
use crate::shell;

/// Remote host table file, relative to the app directory.
pub const REMOTE_HOSTS_FILE: &str = "hosts.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRow {
    pub index: usize,
    pub hostname: String,
    pub addr: IpAddr,
}

impl fmt::Display for HostRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.index, self.hostname, self.addr)
    }
}

/// Rows ordered by global instance index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostTable {
    pub rows: Vec<HostRow>,
}

impl HostTable {
    /// Resolve every plan node once and emit `scale` rows for it.
    pub async fn build(plan: &DeploymentPlan, resolver: &dyn AddressResolver) -> DeployResult<Self> {
        let mut addrs = Vec::with_capacity(plan.nodes.len());
        for node in &plan.nodes {
            let addr = resolver.resolve(&node.hostname).await?;
            debug!(host = %node.hostname, %addr, "resolved");
            addrs.push(addr);
        }

        let scale = plan.scale;
        let rows = plan
            .nodes
            .iter()
            .zip(addrs)
            .enumerate()
            .flat_map(|(position, (node, addr))| {
                (0..scale).map(move |local| HostRow {
                    index: position * scale + local,
                    hostname: node.hostname.clone(),
                    addr,
                })
            })
            .collect();
        Ok(Self { rows })
    }

    /// Newline-delimited `index,hostname,address` rows.
    pub fn render(&self) -> String {
        self.rows
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table as a local artifact.
    pub async fn write_local(&self, path: &Path) -> DeployResult<()> {
        tokio::fs::write(path, self.render())
            .await
            .map_err(|e| DeployError::io(path, e))?;
        info!(path = %path.display(), rows = self.len(), "wrote host table");
        Ok(())
    }
}

/// Append the full table to `<app>/hosts.txt` on every plan node.
pub async fn distribute(
    transport: &Transport,
    dispatcher: &Dispatcher,
    plan: &DeploymentPlan,
    table: &HostTable,
) -> DeployResult<()> {
    let command: Arc<str> = Arc::from(format!(
        "printf '%s\\n' {} >> {}/{REMOTE_HOSTS_FILE}",
        shell::quote(&table.render()),
        plan.app_path
    ));
    let transport = transport.clone();
    info!(nodes = plan.nodes.len(), rows = table.len(), "distributing host table");

    let dispatched = dispatcher
        .run("host-table", Job::per_node(&plan.nodes), move |job| {
            let transport = transport.clone();
            let command = Arc::clone(&command);
            async move {
                transport.exec(&job.node.hostname, &command, false).await?;
                Ok::<(), RemoteError>(())
            }
        })
        .await;

    settle("host-table", dispatched).map(|_| ())
}
