//! Bootstrap phase: prepare every node for launch.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use flotilla_dispatch::{Dispatcher, Job};
use flotilla_remote::{RemoteError, Transport};
use tracing::{debug, info};

use crate::error::{DeployError, DeployResult};
use crate::phase::settle;
use crate::plan::DeploymentPlan;

const NODE_EXPORTER_SCRIPT: &str = include_str!("../scripts/node_exporter.sh");

/// Remote location of the sidecar agent script.
pub const NODE_EXPORTER_REMOTE: &str = "~/node_exporter.sh";

/// Port the sidecar agent listens on.
pub const NODE_EXPORTER_PORT: u16 = 2100;

/// Terminates everything the deploy user runs on the node.
pub const KILL_SESSION: &str = "kill -9 -1";

/// The single chained invocation that resets the node and builds the app.
///
/// Any failing step aborts the rest of the chain.
pub fn bootstrap_command(plan: &DeploymentPlan) -> String {
    let app = &plan.app_path;
    let mut steps = vec![
        "cd".to_string(),
        "rm -rf logs".to_string(),
        format!("rm -rf {app}"),
        "mkdir logs".to_string(),
        format!("git clone {} {app}", plan.app.url),
        format!("cd {app}"),
        format!("git checkout {}", plan.branch),
    ];
    steps.extend(
        plan.bootstrap
            .iter()
            .filter(|c| !c.trim().is_empty())
            .cloned(),
    );
    steps.join(" && ")
}

fn node_exporter_command() -> String {
    format!(
        "cd ~; pkill node_exporter; chmod +x {NODE_EXPORTER_REMOTE}; nohup sh {NODE_EXPORTER_REMOTE} > ~/logs/node_exporter.log 2>&1 &"
    )
}

/// Bootstrap all plan nodes in one dispatcher run.
pub async fn bootstrap_nodes(
    transport: &Transport,
    dispatcher: &Dispatcher,
    plan: &DeploymentPlan,
) -> DeployResult<()> {
    let staged = if plan.node_exporter {
        Some(stage_node_exporter().map_err(|e| DeployError::io("node_exporter.sh", e))?)
    } else {
        None
    };
    let sidecar: Option<Arc<PathBuf>> = staged.as_ref().map(|f| Arc::new(f.path().to_path_buf()));

    let command: Arc<str> = Arc::from(bootstrap_command(plan));
    let transport = transport.clone();
    info!(nodes = plan.nodes.len(), "bootstrapping nodes");

    let dispatched = dispatcher
        .run("bootstrap", Job::per_node(&plan.nodes), move |job| {
            let transport = transport.clone();
            let command = Arc::clone(&command);
            let sidecar = sidecar.clone();
            async move {
                let host = job.node.hostname.as_str();
                info!(host, "bootstrapping node");

                // The session dies with its processes, so the outcome is not
                // meaningful.
                if let Err(e) = transport.exec(host, KILL_SESSION, false).await {
                    debug!(host, error = %e, "session reset returned an error");
                }
                transport.exec(host, &command, false).await?;

                if let Some(script) = sidecar {
                    transport.copy(host, &script, NODE_EXPORTER_REMOTE).await?;
                    transport.exec(host, &node_exporter_command(), false).await?;
                    debug!(host, "node_exporter launched");
                }
                info!(host, "bootstrapping of node succeeded");
                Ok::<(), RemoteError>(())
            }
        })
        .await;

    settle("bootstrap", dispatched).map(|_| ())
}

fn stage_node_exporter() -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("node_exporter")
        .suffix(".sh")
        .tempfile()?;
    file.write_all(NODE_EXPORTER_SCRIPT.as_bytes())?;
    file.flush()?;
    Ok(file)
}
