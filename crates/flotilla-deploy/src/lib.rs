//! flotilla-deploy: multi-phase application deployment onto a node group.
//!
//! # Architecture
//!
//! ```text
//!   DeployRequest ──validate──► GitSource + EnvOverrides
//!        │
//!        ▼
//!   resolution   FleetDirectory / HealthEvaluator ─► NodeSelector
//!        │
//!   manifest     ManifestSource (git clone into a temp dir)
//!        │
//!        ▼
//!   DeploymentPlan (immutable)
//!        │
//!   bootstrap    one dispatcher run, one job per node
//!   host-table   one dispatcher run, full table appended on every node
//!   launch       one dispatcher run, nodes × scale shuffled instance jobs
//!   discovery    optional JSON target groups
//! ```
//!
//! Every phase attempts all of its jobs; if any job failed the phase fails
//! with the full list of per-node failures and later phases do not run.

pub mod bootstrap;
pub mod discovery;
pub mod error;
pub mod hosts;
pub mod launch;
pub mod maintenance;
pub mod manifest;
mod phase;
pub mod pipeline;
pub mod plan;
pub mod resolver;
pub mod selector;
pub mod shell;

pub use discovery::TargetGroup;
pub use error::{DeployError, DeployResult};
pub use hosts::{HostRow, HostTable};
pub use maintenance::{MaintenanceSummary, cleanup, provision};
pub use manifest::{GitManifestSource, LocalManifest, ManifestSource, StaticManifest};
pub use pipeline::{DeployReport, Pipeline};
pub use plan::{DeployRequest, DeploymentPlan, InstanceJob};
pub use resolver::{AddressResolver, DnsResolver, StaticResolver};
pub use selector::NodeSelector;
