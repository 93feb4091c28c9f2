//! Static service-discovery export for an external metrics collector.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bootstrap::NODE_EXPORTER_PORT;
use crate::error::{DeployError, DeployResult};
use crate::plan::DeploymentPlan;

/// Instance metrics port = base + global instance index.
pub const APP_METRICS_BASE_PORT: u16 = 2112;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    fn new(targets: Vec<String>, env: &str, job: &str) -> Self {
        let labels = BTreeMap::from([
            ("env".to_string(), env.to_string()),
            ("job".to_string(), job.to_string()),
        ]);
        Self { targets, labels }
    }
}

/// Two groups: one port per instance, one agent port per node.
pub fn target_groups(plan: &DeploymentPlan) -> Vec<TargetGroup> {
    let instances = plan
        .instance_jobs()
        .into_iter()
        .map(|job| {
            let port = usize::from(APP_METRICS_BASE_PORT) + job.global_index;
            format!("{}:{port}", job.node.hostname)
        })
        .collect();
    let agents = plan
        .nodes
        .iter()
        .map(|n| format!("{}:{NODE_EXPORTER_PORT}", n.hostname))
        .collect();

    vec![
        TargetGroup::new(instances, &plan.group, &plan.app.name),
        TargetGroup::new(agents, &plan.group, "node_exporter"),
    ]
}

/// Write the target groups as a JSON array, replacing any existing file.
pub async fn write_targets(path: &Path, groups: &[TargetGroup]) -> DeployResult<()> {
    let json = serde_json::to_string_pretty(groups)
        .map_err(|e| DeployError::io(path, std::io::Error::other(e)))?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| DeployError::io(path, e))?;
    info!(path = %path.display(), groups = groups.len(), "wrote service discovery targets");
    Ok(())
}
