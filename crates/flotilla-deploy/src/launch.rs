//! Scaled launch phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use flotilla_dispatch::{Dispatcher, Job};
use flotilla_remote::{RemoteError, Transport};
use tracing::info;

use crate::error::DeployResult;
use crate::phase::settle;
use crate::plan::{DeploymentPlan, InstanceJob};
use crate::selector::shuffle;
use crate::shell;

/// Variable carrying the node-local instance index.
pub const INSTANCE_ID_VAR: &str = "FLOTILLA_INSTANCE_ID";

/// Shell script body for one instance: instance id, manifest env, overrides,
/// then the launch commands. Values are exported verbatim.
pub fn start_script(plan: &DeploymentPlan, local_index: usize) -> String {
    let mut script = format!("export {INSTANCE_ID_VAR}={local_index}; ");
    let vars = plan.env.iter().map(|(k, v)| (k.as_str(), v.as_str()));
    for (key, value) in vars.chain(plan.overrides.iter()) {
        script.push_str(&format!("export {key}={}; ", shell::quote(value)));
    }
    for command in plan.launch.iter().filter(|c| !c.trim().is_empty()) {
        script.push_str(command);
        script.push_str("; ");
    }
    script
}

/// Write, mark executable and start one instance's script, detached.
pub fn launch_command(plan: &DeploymentPlan, instance: &InstanceJob) -> String {
    let i = instance.local_index;
    let file = format!("start_instance_{i}.sh");
    let sudo = if plan.sudo { "sudo " } else { "" };
    format!(
        "cd {app} && printf '%s\\n' {script} > {file} && chmod +x {file} && \
         {{ {sudo}nohup sh {file} > ~/logs/instance_{i}.log 2>&1 & }}",
        app = plan.app_path,
        script = shell::quote(&start_script(plan, i)),
    )
}

/// All instance jobs of the plan, shuffled across nodes.
pub fn shuffled_instance_jobs(plan: &DeploymentPlan, seed: Option<u64>) -> Vec<InstanceJob> {
    let mut jobs = plan.instance_jobs();
    shuffle(&mut jobs, seed);
    jobs
}

/// Launch every instance in one dispatcher run. Returns the instance count.
pub async fn launch_instances(
    transport: &Transport,
    dispatcher: &Dispatcher,
    plan: &DeploymentPlan,
    seed: Option<u64>,
) -> DeployResult<usize> {
    let jobs: Vec<Job<String>> = shuffled_instance_jobs(plan, seed)
        .into_iter()
        .enumerate()
        .map(|(id, instance)| {
            let command = launch_command(plan, &instance);
            Job::new(id, instance.node, command)
        })
        .collect();
    let total = jobs.len();
    info!(instances = total, nodes = plan.nodes.len(), "launching instances");

    let launched = Arc::new(AtomicUsize::new(0));
    let transport = transport.clone();
    let dispatched = dispatcher
        .run("launch", jobs, move |job| {
            let transport = transport.clone();
            let launched = Arc::clone(&launched);
            async move {
                transport.exec(&job.node.hostname, &job.payload, false).await?;
                let done = launched.fetch_add(1, Ordering::SeqCst) + 1;
                info!(host = %job.node.hostname, "{done}/{total} instances launched");
                Ok::<(), RemoteError>(())
            }
        })
        .await;

    settle("launch", dispatched)?;
    info!(instances = total, "app launched on all nodes");
    Ok(total)
}
