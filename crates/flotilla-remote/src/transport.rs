//! Collaborator contracts and the `Transport` bundle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::color::ColorRegistry;
use crate::error::RemoteResult;
use crate::ssh::{SshConfig, SshTransport};

/// Runs one command string over an authenticated remote session.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// With `stream`, stdout/stderr are echoed line by line to the console.
    async fn exec(&self, host: &str, command: &str, stream: bool) -> RemoteResult<()>;
}

/// Copies one local file to a remote path (mode 0644).
#[async_trait]
pub trait RemoteTransfer: Send + Sync {
    async fn copy(&self, host: &str, local: &Path, remote: &str) -> RemoteResult<()>;
}

/// Checks whether a TCP port accepts connections.
#[async_trait]
pub trait PortChecker: Send + Sync {
    async fn is_open(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Plain TCP connect with a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpPortChecker;

#[async_trait]
impl PortChecker for TcpPortChecker {
    async fn is_open(&self, host: &str, port: u16, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(host, port, error = %e, "connect failed");
                false
            }
            Err(_) => {
                debug!(host, port, ?timeout, "connect timed out");
                false
            }
        }
    }
}

/// Handles to the three remote collaborators, cheap to clone into workers.
#[derive(Clone)]
pub struct Transport {
    pub executor: Arc<dyn RemoteExecutor>,
    pub transfer: Arc<dyn RemoteTransfer>,
    pub ports: Arc<dyn PortChecker>,
}

impl Transport {
    pub fn new(
        executor: Arc<dyn RemoteExecutor>,
        transfer: Arc<dyn RemoteTransfer>,
        ports: Arc<dyn PortChecker>,
    ) -> Self {
        Self {
            executor,
            transfer,
            ports,
        }
    }

    /// ssh/scp execution and transfer, TCP port checks.
    pub fn ssh(config: SshConfig, colors: Arc<ColorRegistry>) -> Self {
        let ssh = Arc::new(SshTransport::new(config, colors));
        Self {
            executor: ssh.clone(),
            transfer: ssh,
            ports: Arc::new(TcpPortChecker),
        }
    }

    pub async fn exec(&self, host: &str, command: &str, stream: bool) -> RemoteResult<()> {
        self.executor.exec(host, command, stream).await
    }

    pub async fn copy(&self, host: &str, local: &Path, remote: &str) -> RemoteResult<()> {
        self.transfer.copy(host, local, remote).await
    }

    pub async fn port_open(&self, host: &str, port: u16, timeout: Duration) -> bool {
        self.ports.is_open(host, port, timeout).await
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_checker_sees_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(
            TcpPortChecker
                .is_open("127.0.0.1", port, Duration::from_secs(1))
                .await
        );
    }

    #[tokio::test]
    async fn tcp_checker_reports_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(
            !TcpPortChecker
                .is_open("127.0.0.1", port, Duration::from_millis(200))
                .await
        );
    }
}
