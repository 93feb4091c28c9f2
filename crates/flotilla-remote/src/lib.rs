//! flotilla-remote: the remote side of every orchestration phase.
//!
//! Three collaborator contracts are consumed by the health and deploy
//! crates:
//!
//! - [`RemoteExecutor`] runs one shell command on a node
//! - [`RemoteTransfer`] copies one local file to a node
//! - [`PortChecker`] tests whether a TCP port on a node accepts connections
//!
//! [`Transport`] bundles the three behind `Arc<dyn ..>` handles.
//! [`SshTransport`] implements execution and transfer with the system
//! `ssh` and `scp` binaries; [`TcpPortChecker`] uses `tokio::net`.
//! Streamed output is prefixed with the hostname and colored through a
//! run-scoped [`ColorRegistry`].
//!
//! The `test-util` feature adds the `mock` module, an in-memory transport
//! that records every call.

pub mod color;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod ssh;
pub mod transport;

pub use color::{ColorRegistry, OutputStream};
pub use error::{RemoteError, RemoteResult};
pub use ssh::{SshConfig, SshTransport};
pub use transport::{PortChecker, RemoteExecutor, RemoteTransfer, TcpPortChecker, Transport};
