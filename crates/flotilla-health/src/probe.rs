//! Per-node probe state machine.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use flotilla_core::Node;
use flotilla_remote::Transport;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Probe timing and placement.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSettings {
    /// Remote control (ssh) port checked for reachability.
    pub control_port: u16,
    pub reach_timeout: Duration,
    /// Port opened by the probe script.
    pub probe_port: u16,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// Where the probe script is placed on the node.
    pub remote_script: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            control_port: flotilla_core::DEFAULT_SSH_PORT,
            reach_timeout: Duration::from_secs(1),
            probe_port: 9876,
            poll_attempts: 10,
            poll_interval: Duration::from_secs(2),
            remote_script: "~/flotilla_probe.sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeStep {
    Reachability,
    Smoke,
    Transfer,
    Launch,
    AwaitPort,
}

impl ProbeStep {
    fn next(self) -> Option<ProbeStep> {
        match self {
            ProbeStep::Reachability => Some(ProbeStep::Smoke),
            ProbeStep::Smoke => Some(ProbeStep::Transfer),
            ProbeStep::Transfer => Some(ProbeStep::Launch),
            ProbeStep::Launch => Some(ProbeStep::AwaitPort),
            ProbeStep::AwaitPort => None,
        }
    }
}

impl fmt::Display for ProbeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeStep::Reachability => "reachability",
            ProbeStep::Smoke => "smoke command",
            ProbeStep::Transfer => "script transfer",
            ProbeStep::Launch => "script launch",
            ProbeStep::AwaitPort => "probe port",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    Unknown,
    Probing(ProbeStep),
    Healthy,
    Faulty { step: ProbeStep, reason: String },
}

impl ProbeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProbeState::Healthy | ProbeState::Faulty { .. })
    }
}

/// Why a node was classified faulty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} check failed: {reason}")]
pub struct ProbeFailure {
    pub step: ProbeStep,
    pub reason: String,
}

/// Drives one node through the probe steps. Terminal states are final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeProbe {
    state: ProbeState,
}

impl NodeProbe {
    pub fn new() -> Self {
        Self {
            state: ProbeState::Unknown,
        }
    }

    pub fn state(&self) -> &ProbeState {
        &self.state
    }

    /// Unknown → Probing(Reachability).
    pub fn begin(&mut self) {
        if self.state == ProbeState::Unknown {
            self.state = ProbeState::Probing(ProbeStep::Reachability);
        }
    }

    /// The current step succeeded: move to the next step, or Healthy.
    pub fn pass(&mut self) {
        if let ProbeState::Probing(step) = self.state {
            self.state = match step.next() {
                Some(next) => ProbeState::Probing(next),
                None => ProbeState::Healthy,
            };
        }
    }

    /// The current step failed: Faulty.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if let ProbeState::Probing(step) = self.state {
            self.state = ProbeState::Faulty {
                step,
                reason: reason.into(),
            };
        }
    }
}

impl Default for NodeProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the probe sequence against one node.
pub async fn probe_node(
    node: &Node,
    transport: &Transport,
    settings: &ProbeSettings,
    local_script: &Path,
) -> Result<(), ProbeFailure> {
    let host = node.hostname.as_str();
    let mut probe = NodeProbe::new();
    let mut script_placed = false;

    probe.begin();
    while let ProbeState::Probing(step) = *probe.state() {
        debug!(host, %step, "probe step");
        match run_step(step, host, transport, settings, local_script).await {
            Ok(()) => {
                if step == ProbeStep::Transfer {
                    script_placed = true;
                }
                probe.pass();
            }
            Err(reason) => probe.fail(reason),
        }
    }

    if script_placed {
        teardown(host, transport, settings).await;
    }

    if let ProbeState::Faulty { step, reason } = probe.state() {
        warn!(host, %step, %reason, "node is faulty");
        return Err(ProbeFailure {
            step: *step,
            reason: reason.clone(),
        });
    }
    info!(host, "node is healthy");
    Ok(())
}

async fn run_step(
    step: ProbeStep,
    host: &str,
    transport: &Transport,
    settings: &ProbeSettings,
    local_script: &Path,
) -> Result<(), String> {
    match step {
        ProbeStep::Reachability => {
            if transport
                .port_open(host, settings.control_port, settings.reach_timeout)
                .await
            {
                Ok(())
            } else {
                Err(format!("port {} unreachable", settings.control_port))
            }
        }
        ProbeStep::Smoke => transport
            .exec(host, "ls /", false)
            .await
            .map_err(|e| e.to_string()),
        ProbeStep::Transfer => transport
            .copy(host, local_script, &settings.remote_script)
            .await
            .map_err(|e| e.to_string()),
        ProbeStep::Launch => {
            let command = format!(
                "cd ~; nohup sh {} {} > /dev/null 2>&1 &",
                settings.remote_script, settings.probe_port
            );
            transport
                .exec(host, &command, false)
                .await
                .map_err(|e| e.to_string())
        }
        ProbeStep::AwaitPort => await_port(host, transport, settings).await,
    }
}

/// Poll the probe port, `poll_attempts` times `poll_interval` apart.
async fn await_port(host: &str, transport: &Transport, settings: &ProbeSettings) -> Result<(), String> {
    for attempt in 1..=settings.poll_attempts {
        if transport
            .port_open(host, settings.probe_port, settings.reach_timeout)
            .await
        {
            debug!(host, attempt, port = settings.probe_port, "probe port open");
            return Ok(());
        }
        if attempt < settings.poll_attempts {
            tokio::time::sleep(settings.poll_interval).await;
        }
    }
    Err(format!(
        "port {} not open after {} attempts",
        settings.probe_port, settings.poll_attempts
    ))
}

async fn teardown(host: &str, transport: &Transport, settings: &ProbeSettings) {
    if let Err(e) = transport.exec(host, "kill -9 -1", false).await {
        debug!(host, error = %e, "ignoring teardown error");
    }
    let remove = format!("rm -f {}", settings.remote_script);
    if let Err(e) = transport.exec(host, &remove, false).await {
        debug!(host, error = %e, "ignoring teardown error");
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use flotilla_remote::mock::{RecordingTransport, RemoteCall};

    use super::*;

    fn fast_settings() -> ProbeSettings {
        ProbeSettings {
            poll_interval: Duration::from_millis(1),
            ..ProbeSettings::default()
        }
    }

    fn script() -> PathBuf {
        PathBuf::from("/tmp/flotilla_probe.sh")
    }

    #[test]
    fn state_machine_walks_all_steps() {
        let mut probe = NodeProbe::new();
        assert_eq!(probe.state(), &ProbeState::Unknown);
        probe.begin();
        assert_eq!(probe.state(), &ProbeState::Probing(ProbeStep::Reachability));
        for _ in 0..4 {
            probe.pass();
        }
        assert_eq!(probe.state(), &ProbeState::Probing(ProbeStep::AwaitPort));
        probe.pass();
        assert_eq!(probe.state(), &ProbeState::Healthy);
        assert!(probe.state().is_terminal());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut probe = NodeProbe::new();
        probe.begin();
        probe.pass();
        probe.fail("ssh refused");
        let faulty = probe.state().clone();
        assert!(matches!(faulty, ProbeState::Faulty { step: ProbeStep::Smoke, .. }));

        probe.pass();
        probe.begin();
        probe.fail("again");
        assert_eq!(probe.state(), &faulty);
    }

    #[test]
    fn pass_before_begin_is_ignored() {
        let mut probe = NodeProbe::new();
        probe.pass();
        probe.fail("x");
        assert_eq!(probe.state(), &ProbeState::Unknown);
    }

    #[tokio::test]
    async fn healthy_node_runs_every_step_then_teardown() {
        let remote = RecordingTransport::new();
        let node = Node::new("a.example.org", 1);
        probe_node(&node, &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap();

        let commands = remote.commands_on("a.example.org");
        assert_eq!(commands[0], "ls /");
        assert!(commands[1].contains("nohup sh ~/flotilla_probe.sh 9876"));
        assert_eq!(commands[2], "kill -9 -1");
        assert_eq!(commands[3], "rm -f ~/flotilla_probe.sh");
        assert_eq!(remote.copies_to("a.example.org"), vec!["~/flotilla_probe.sh"]);
        assert_eq!(remote.port_checks("a.example.org", 22), 1);
        assert_eq!(remote.port_checks("a.example.org", 9876), 1);
    }

    #[tokio::test]
    async fn unreachable_node_short_circuits() {
        let remote = RecordingTransport::new();
        remote.unreachable("b.example.org");
        let node = Node::new("b.example.org", 2);

        let failure = probe_node(&node, &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap_err();
        assert_eq!(failure.step, ProbeStep::Reachability);
        assert_eq!(
            remote.calls(),
            vec![RemoteCall::PortCheck {
                host: "b.example.org".to_string(),
                port: 22
            }]
        );
    }

    #[tokio::test]
    async fn smoke_failure_skips_transfer() {
        let remote = RecordingTransport::new();
        remote.fail_host("c");
        let failure = probe_node(&Node::new("c", 3), &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap_err();
        assert_eq!(failure.step, ProbeStep::Smoke);
        assert!(remote.copies_to("c").is_empty());
        assert_eq!(remote.commands_on("c"), vec!["ls /"]);
    }

    #[tokio::test]
    async fn transfer_failure_has_no_teardown() {
        let remote = RecordingTransport::new();
        remote.fail_copies_to("d");
        let failure = probe_node(&Node::new("d", 4), &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap_err();
        assert_eq!(failure.step, ProbeStep::Transfer);
        assert_eq!(remote.commands_on("d"), vec!["ls /"]);
    }

    #[tokio::test]
    async fn launch_failure_still_tears_down() {
        let remote = RecordingTransport::new();
        remote.fail_commands_containing("nohup");
        let failure = probe_node(&Node::new("e", 5), &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap_err();
        assert_eq!(failure.step, ProbeStep::Launch);
        let commands = remote.commands_on("e");
        assert_eq!(commands.last().map(String::as_str), Some("rm -f ~/flotilla_probe.sh"));
        assert_eq!(remote.port_checks("e", 9876), 0);
    }

    #[tokio::test]
    async fn port_poll_retries_until_open() {
        let remote = RecordingTransport::new();
        remote.open_port_after("f", 9876, 3);
        probe_node(&Node::new("f", 6), &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap();
        assert_eq!(remote.port_checks("f", 9876), 4);
    }

    #[tokio::test]
    async fn port_poll_gives_up_after_attempts() {
        let remote = RecordingTransport::new();
        remote.close_port("g", 9876);
        let failure = probe_node(&Node::new("g", 7), &remote.transport(), &fast_settings(), &script())
            .await
            .unwrap_err();
        assert_eq!(failure.step, ProbeStep::AwaitPort);
        assert_eq!(remote.port_checks("g", 9876), 10);
        assert!(remote.commands_on("g").contains(&"kill -9 -1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn port_poll_waits_between_attempts() {
        let remote = RecordingTransport::new();
        remote.close_port("h", 9876);
        let started = tokio::time::Instant::now();
        let _ = probe_node(&Node::new("h", 8), &remote.transport(), &ProbeSettings::default(), &script()).await;
        // 10 attempts, 9 sleeps of 2s in between.
        assert_eq!(started.elapsed(), Duration::from_secs(18));
    }

    #[test]
    fn failure_display_names_step() {
        let failure = ProbeFailure {
            step: ProbeStep::AwaitPort,
            reason: "port 9876 not open after 10 attempts".to_string(),
        };
        assert_eq!(
            failure.to_string(),
            "probe port check failed: port 9876 not open after 10 attempts"
        );
    }
}
