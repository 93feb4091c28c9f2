//! Recording transport for tests.
//!
//! Records every remote call and answers according to configurable
//! failure rules, so orchestration code can be tested without a fleet.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RemoteError, RemoteResult};
use crate::transport::{PortChecker, RemoteExecutor, RemoteTransfer, Transport};

/// One recorded remote interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Exec {
        host: String,
        command: String,
        stream: bool,
    },
    Copy {
        host: String,
        local: PathBuf,
        remote: String,
    },
    PortCheck {
        host: String,
        port: u16,
    },
}

impl RemoteCall {
    pub fn host(&self) -> &str {
        match self {
            RemoteCall::Exec { host, .. }
            | RemoteCall::Copy { host, .. }
            | RemoteCall::PortCheck { host, .. } => host,
        }
    }
}

#[derive(Debug, Default)]
struct Rules {
    unreachable: HashSet<String>,
    failing_hosts: HashSet<String>,
    failing_fragments: Vec<String>,
    failing_copies: HashSet<String>,
    closed_ports: HashSet<(String, u16)>,
    /// Port checks that fail before the port opens.
    opens_after: HashMap<(String, u16), usize>,
}

/// A `RemoteExecutor + RemoteTransfer + PortChecker` that never leaves
/// the process.
///
/// By default every call succeeds and every port is open.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RemoteCall>>,
    rules: Mutex<Rules>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A `Transport` whose three handles all point at this recorder.
    pub fn transport(self: &Arc<Self>) -> Transport {
        Transport::new(self.clone(), self.clone(), self.clone())
    }

    /// Every call to `host` fails with a connectivity error and every port
    /// on it is closed.
    pub fn unreachable(&self, host: &str) -> &Self {
        self.rules().unreachable.insert(host.to_string());
        self
    }

    /// Every command on `host` exits non-zero.
    pub fn fail_host(&self, host: &str) -> &Self {
        self.rules().failing_hosts.insert(host.to_string());
        self
    }

    /// Commands containing `fragment` exit non-zero on every host.
    pub fn fail_commands_containing(&self, fragment: &str) -> &Self {
        self.rules().failing_fragments.push(fragment.to_string());
        self
    }

    pub fn fail_copies_to(&self, host: &str) -> &Self {
        self.rules().failing_copies.insert(host.to_string());
        self
    }

    pub fn close_port(&self, host: &str, port: u16) -> &Self {
        self.rules().closed_ports.insert((host.to_string(), port));
        self
    }

    /// The first `failures` checks of `host:port` report it closed.
    pub fn open_port_after(&self, host: &str, port: u16, failures: usize) -> &Self {
        self.rules()
            .opens_after
            .insert((host.to_string(), port), failures);
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn calls_for(&self, host: &str) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.host() == host)
            .collect()
    }

    /// Commands executed on `host`, in order.
    pub fn commands_on(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Exec { host: h, command, .. } if h == host => Some(command),
                _ => None,
            })
            .collect()
    }

    /// Remote paths copied to `host`, in order.
    pub fn copies_to(&self, host: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                RemoteCall::Copy { host: h, remote, .. } if h == host => Some(remote),
                _ => None,
            })
            .collect()
    }

    pub fn port_checks(&self, host: &str, port: u16) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RemoteCall::PortCheck { host: h, port: p } if h == host && *p == port))
            .count()
    }

    fn rules(&self) -> std::sync::MutexGuard<'_, Rules> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: RemoteCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl RemoteExecutor for RecordingTransport {
    async fn exec(&self, host: &str, command: &str, stream: bool) -> RemoteResult<()> {
        if command.trim().is_empty() {
            return Err(RemoteError::EmptyCommand);
        }
        self.record(RemoteCall::Exec {
            host: host.to_string(),
            command: command.to_string(),
            stream,
        });

        let rules = self.rules();
        if rules.unreachable.contains(host) {
            return Err(RemoteError::Connectivity {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let failing = rules.failing_hosts.contains(host)
            || rules.failing_fragments.iter().any(|f| command.contains(f));
        if failing {
            return Err(RemoteError::Command {
                host: host.to_string(),
                status: "exit status 1".to_string(),
                detail: format!("`{command}` failed"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteTransfer for RecordingTransport {
    async fn copy(&self, host: &str, local: &Path, remote: &str) -> RemoteResult<()> {
        self.record(RemoteCall::Copy {
            host: host.to_string(),
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });

        let rules = self.rules();
        if rules.unreachable.contains(host) {
            return Err(RemoteError::Connectivity {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        if rules.failing_copies.contains(host) {
            return Err(RemoteError::Transfer {
                host: host.to_string(),
                local: local.display().to_string(),
                remote: remote.to_string(),
                reason: "permission denied".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PortChecker for RecordingTransport {
    async fn is_open(&self, host: &str, port: u16, _timeout: Duration) -> bool {
        self.record(RemoteCall::PortCheck {
            host: host.to_string(),
            port,
        });

        let mut rules = self.rules();
        if rules.unreachable.contains(host) {
            return false;
        }
        if rules.closed_ports.contains(&(host.to_string(), port)) {
            return false;
        }
        if let Some(remaining) = rules.opens_after.get_mut(&(host.to_string(), port)) {
            if *remaining > 0 {
                *remaining -= 1;
                return false;
            }
        }
        true
    }
}
