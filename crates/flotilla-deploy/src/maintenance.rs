//! Provision and cleanup runs over a set of nodes.
//!
//! Unlike deployment phases these never abort: every node is attempted and
//! the outcome is summarised.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use flotilla_core::Node;
use flotilla_dispatch::{Dispatched, Dispatcher, Job};
use flotilla_remote::{RemoteError, Transport};
use tracing::{debug, info, warn};

use crate::bootstrap::KILL_SESSION;
use crate::error::{DeployError, DeployResult};

/// Remote location of a provisioning script.
pub const PROVISION_REMOTE: &str = "~/provision.sh";

/// Per-node outcome of a maintenance run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceSummary {
    pub succeeded: Vec<String>,
    /// `(hostname, message)`.
    pub failed: Vec<(String, String)>,
}

impl MaintenanceSummary {
    fn from_dispatched(dispatched: Dispatched<(), RemoteError>) -> Self {
        let mut summary = Self::default();
        for result in dispatched.into_ordered() {
            match result.outcome {
                Ok(()) => summary.succeeded.push(result.node.hostname),
                Err(e) => summary.failed.push((result.node.hostname, e.to_string())),
            }
        }
        summary
    }

    pub fn all_ok(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}

/// Copy `script` to every node, run it with streamed output, delete it.
pub async fn provision(
    transport: &Transport,
    dispatcher: &Dispatcher,
    nodes: &[Node],
    script: &Path,
    sudo: bool,
) -> DeployResult<MaintenanceSummary> {
    if !script.is_file() {
        return Err(DeployError::io(
            script,
            std::io::Error::new(std::io::ErrorKind::NotFound, "provision script not found"),
        ));
    }
    info!(nodes = nodes.len(), script = %script.display(), "provisioning nodes");

    let script: Arc<PathBuf> = Arc::new(script.to_path_buf());
    let run: Arc<str> = Arc::from(format!(
        "cd; chmod +x {PROVISION_REMOTE}; {}sh {PROVISION_REMOTE}",
        if sudo { "sudo " } else { "" }
    ));
    let transport = transport.clone();

    let dispatched = dispatcher
        .run("provision", Job::per_node(nodes), move |job| {
            let transport = transport.clone();
            let script = Arc::clone(&script);
            let run = Arc::clone(&run);
            async move {
                let host = job.node.hostname.as_str();
                transport.copy(host, &script, PROVISION_REMOTE).await?;
                transport.exec(host, &run, true).await?;
                if let Err(e) = transport
                    .exec(host, &format!("rm -f {PROVISION_REMOTE}"), false)
                    .await
                {
                    debug!(host, error = %e, "could not remove provision script");
                }
                info!(host, "provision of node done");
                Ok::<(), RemoteError>(())
            }
        })
        .await;

    let summary = MaintenanceSummary::from_dispatched(dispatched);
    report("provision", &summary);
    Ok(summary)
}

/// Remove the app directory and terminate session processes on every node.
pub async fn cleanup(
    transport: &Transport,
    dispatcher: &Dispatcher,
    nodes: &[Node],
    app_path: &str,
) -> MaintenanceSummary {
    let remove: Arc<str> = Arc::from(format!("rm -rf ~/{app_path}"));
    let transport = transport.clone();
    info!(nodes = nodes.len(), "cleaning up nodes");

    let dispatched = dispatcher
        .run("cleanup", Job::per_node(nodes), move |job| {
            let transport = transport.clone();
            let remove = Arc::clone(&remove);
            async move {
                let host = job.node.hostname.as_str();
                let removed = transport.exec(host, &remove, false).await;
                if let Err(e) = transport.exec(host, KILL_SESSION, false).await {
                    debug!(host, error = %e, "session reset returned an error");
                }
                removed
            }
        })
        .await;

    let summary = MaintenanceSummary::from_dispatched(dispatched);
    report("cleanup", &summary);
    summary
}

fn report(phase: &'static str, summary: &MaintenanceSummary) {
    if summary.all_ok() {
        info!(phase, nodes = summary.total(), "completed on all nodes");
    } else {
        warn!(
            phase,
            failed = summary.failed.len(),
            total = summary.total(),
            "completed with failures"
        );
    }
}

#[cfg(test)]
mod tests {
    use flotilla_remote::mock::{RecordingTransport, RemoteCall};

    use super::*;

    fn nodes() -> Vec<Node> {
        vec![Node::new("a", 1), Node::new("b", 2), Node::new("c", 3)]
    }

    fn script() -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "#!/bin/sh\napt-get install -y git\n").unwrap();
        file
    }

    #[tokio::test]
    async fn provision_copies_runs_and_removes() {
        let remote = RecordingTransport::new();
        let script = script();
        let summary = provision(&remote.transport(), &Dispatcher::new(10), &nodes(), script.path(), true)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, vec!["a", "b", "c"]);
        let calls = remote.calls_for("b");
        assert!(matches!(&calls[0], RemoteCall::Copy { remote, .. } if remote == PROVISION_REMOTE));
        assert!(matches!(
            &calls[1],
            RemoteCall::Exec { command, stream: true, .. } if command.ends_with("sudo sh ~/provision.sh")
        ));
        assert!(matches!(&calls[2], RemoteCall::Exec { command, .. } if command == "rm -f ~/provision.sh"));
    }

    #[tokio::test]
    async fn provision_failures_do_not_stop_siblings() {
        let remote = RecordingTransport::new();
        remote.fail_copies_to("a");
        remote.fail_host("c");
        let script = script();
        let summary = provision(&remote.transport(), &Dispatcher::new(2), &nodes(), script.path(), false)
            .await
            .unwrap();

        assert_eq!(summary.succeeded, vec!["b"]);
        let failed: Vec<&str> = summary.failed.iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(failed, vec!["a", "c"]);
        assert!(remote.commands_on("a").is_empty());
    }

    #[tokio::test]
    async fn provision_requires_local_script() {
        let remote = RecordingTransport::new();
        let err = provision(
            &remote.transport(),
            &Dispatcher::new(2),
            &nodes(),
            Path::new("/nonexistent/provision.sh"),
            false,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DeployError::Io { .. }));
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn cleanup_removes_app_and_resets_session() {
        let remote = RecordingTransport::new();
        remote.fail_commands_containing(KILL_SESSION);
        let summary = cleanup(&remote.transport(), &Dispatcher::new(10), &nodes(), "app").await;

        assert!(summary.all_ok());
        assert_eq!(remote.commands_on("a"), vec!["rm -rf ~/app", KILL_SESSION]);
    }

    #[tokio::test]
    async fn cleanup_reports_unreachable_nodes() {
        let remote = RecordingTransport::new();
        remote.unreachable("b");
        let summary = cleanup(&remote.transport(), &Dispatcher::new(10), &nodes(), "app").await;
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "b");
    }
}
