//! ssh/scp transport.
//!
//! Spawns the system `ssh` and `scp` binaries non-interactively
//! (`BatchMode=yes`); authentication comes from the ssh agent or the
//! configured identity file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::color::{ColorRegistry, OutputStream};
use crate::error::{RemoteError, RemoteResult};
use crate::transport::{RemoteExecutor, RemoteTransfer};

/// Exit status ssh uses for its own (connection/auth) failures.
const SSH_CONNECTION_FAILURE: i32 = 255;

/// Remote login parameters shared by every node of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    pub identity: Option<PathBuf>,
    pub connect_timeout: Duration,
}

impl SshConfig {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            port: flotilla_core::DEFAULT_SSH_PORT,
            identity: None,
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_identity(mut self, identity: Option<PathBuf>) -> Self {
        self.identity = identity;
        self
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout.as_secs().max(1)),
        ];
        if let Some(ref key) = self.identity {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }

    /// Arguments for `ssh`, the remote command passed as one string.
    pub fn ssh_args(&self, host: &str, command: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args.push(format!("{}@{}", self.user, host));
        args.push(command.to_string());
        args
    }

    /// Arguments for `scp`. scp resolves relative paths against the remote
    /// home, so a leading `~/` is dropped.
    pub fn scp_args(&self, host: &str, local: &Path, remote: &str) -> Vec<String> {
        let remote = remote.strip_prefix("~/").unwrap_or(remote);
        let mut args = self.common_args();
        args.push("-P".to_string());
        args.push(self.port.to_string());
        args.push(local.display().to_string());
        args.push(format!("{}@{}:{}", self.user, host, remote));
        args
    }
}

/// Executes commands and copies files with the system ssh client.
pub struct SshTransport {
    config: SshConfig,
    colors: Arc<ColorRegistry>,
}

impl SshTransport {
    pub fn new(config: SshConfig, colors: Arc<ColorRegistry>) -> Self {
        Self { config, colors }
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

/// Read `reader` line by line, optionally echoing each line, and return the
/// last non-empty line for error reporting.
async fn pump<R>(
    reader: R,
    host: String,
    stream: OutputStream,
    colors: Arc<ColorRegistry>,
    echo: bool,
) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut last = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if echo {
            colors.print_line(&host, stream, &line);
        }
        if !line.trim().is_empty() {
            last = line;
        }
    }
    last
}

/// Wait for a reader task. A reader that panicked or was cancelled yields
/// an empty last line.
async fn join_reader(host: &str, stream: OutputStream, task: Option<JoinHandle<String>>) -> String {
    let Some(task) = task else {
        return String::new();
    };
    match task.await {
        Ok(last) => last,
        Err(e) => {
            debug!(host, ?stream, error = %e, "output reader task failed");
            String::new()
        }
    }
}

#[async_trait]
impl RemoteExecutor for SshTransport {
    async fn exec(&self, host: &str, command: &str, stream: bool) -> RemoteResult<()> {
        if command.trim().is_empty() {
            return Err(RemoteError::EmptyCommand);
        }

        info!(host, command, "executing remote command");
        let mut child = Command::new("ssh")
            .args(self.config.ssh_args(host, command))
            .stdin(Stdio::null())
            .stdout(if stream { Stdio::piped() } else { Stdio::null() })
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RemoteError::Connectivity {
                host: host.to_string(),
                reason: format!("failed to spawn ssh: {e}"),
            })?;

        let stdout_task = child.stdout.take().map(|out| {
            tokio::spawn(pump(
                out,
                host.to_string(),
                OutputStream::Stdout,
                Arc::clone(&self.colors),
                true,
            ))
        });
        let stderr_task = child.stderr.take().map(|err| {
            tokio::spawn(pump(
                err,
                host.to_string(),
                OutputStream::Stderr,
                Arc::clone(&self.colors),
                stream,
            ))
        });

        let status = child.wait().await.map_err(|source| RemoteError::Io {
            host: host.to_string(),
            source,
        })?;

        join_reader(host, OutputStream::Stdout, stdout_task).await;
        let detail = join_reader(host, OutputStream::Stderr, stderr_task).await;

        match status.code() {
            Some(0) => {
                debug!(host, "remote command succeeded");
                Ok(())
            }
            Some(SSH_CONNECTION_FAILURE) => Err(RemoteError::Connectivity {
                host: host.to_string(),
                reason: if detail.is_empty() {
                    "ssh exited with status 255".to_string()
                } else {
                    detail
                },
            }),
            code => Err(RemoteError::Command {
                host: host.to_string(),
                status: match code {
                    Some(c) => format!("exit status {c}"),
                    None => "terminated by signal".to_string(),
                },
                detail,
            }),
        }
    }
}

#[async_trait]
impl RemoteTransfer for SshTransport {
    async fn copy(&self, host: &str, local: &Path, remote: &str) -> RemoteResult<()> {
        let transfer_err = |reason: String| RemoteError::Transfer {
            host: host.to_string(),
            local: local.display().to_string(),
            remote: remote.to_string(),
            reason,
        };

        if !local.is_file() {
            return Err(transfer_err("no such local file".to_string()));
        }

        let output = Command::new("scp")
            .args(self.config.scp_args(host, local, remote))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| transfer_err(format!("failed to spawn scp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("scp failed")
                .to_string();
            return Err(transfer_err(reason));
        }

        self.exec(host, &format!("chmod 644 {remote}"), false).await?;
        info!(host, local = %local.display(), remote, "transferred file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_results_are_joined() {
        let done = tokio::spawn(async { "last line".to_string() });
        assert_eq!(join_reader("n1", OutputStream::Stderr, Some(done)).await, "last line");
        assert_eq!(join_reader("n1", OutputStream::Stdout, None).await, "");
    }

    #[tokio::test]
    async fn failed_reader_yields_empty_detail() {
        async fn failing_reader() -> String {
            panic!("reader failed")
        }
        let panicked = tokio::spawn(failing_reader());
        assert_eq!(join_reader("n1", OutputStream::Stdout, Some(panicked)).await, "");

        let aborted = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            String::new()
        });
        aborted.abort();
        assert_eq!(join_reader("n1", OutputStream::Stderr, Some(aborted)).await, "");
    }

    fn config() -> SshConfig {
        SshConfig::new("slice_user")
            .with_port(2222)
            .with_identity(Some(PathBuf::from("/keys/id_rsa")))
    }

    #[test]
    fn ssh_args_end_with_target_and_command() {
        let args = config().ssh_args("n1.example.org", "ls /");
        let n = args.len();
        assert_eq!(args[n - 2], "slice_user@n1.example.org");
        assert_eq!(args[n - 1], "ls /");
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/keys/id_rsa"]));
        assert!(args.contains(&"BatchMode=yes".to_string()));
    }

    #[test]
    fn scp_args_strip_home_prefix() {
        let args = config().scp_args("n1", Path::new("/tmp/probe.sh"), "~/probe.sh");
        let n = args.len();
        assert_eq!(args[n - 2], "/tmp/probe.sh");
        assert_eq!(args[n - 1], "slice_user@n1:probe.sh");
        assert!(args.windows(2).any(|w| w == ["-P", "2222"]));
    }

    #[test]
    fn default_config_has_no_identity() {
        let args = SshConfig::new("u").ssh_args("h", "true");
        assert!(!args.contains(&"-i".to_string()));
        assert!(args.windows(2).any(|w| w == ["-p", "22"]));
    }

    #[tokio::test]
    async fn empty_command_rejected() {
        let ssh = SshTransport::new(SshConfig::new("u"), Arc::new(ColorRegistry::new()));
        let err = ssh.exec("h", "   ", false).await.unwrap_err();
        assert!(matches!(err, RemoteError::EmptyCommand));
    }

    #[tokio::test]
    async fn copy_of_missing_file_fails_before_spawning() {
        let ssh = SshTransport::new(SshConfig::new("u"), Arc::new(ColorRegistry::new()));
        let dir = tempfile::tempdir().unwrap();
        let err = ssh
            .copy("h", &dir.path().join("absent.sh"), "~/absent.sh")
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transfer { .. }));
    }
}
