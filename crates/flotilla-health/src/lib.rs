//! flotilla-health: classify the nodes of a group as healthy or faulty.
//!
//! # Probe sequence
//!
//! ```text
//! Unknown → Probing(step) → Healthy | Faulty
//!
//! step: Reachability   TCP connect to the control port (1s)
//!       Smoke          `ls /` over ssh
//!       Transfer       copy the probe script
//!       Launch         start the probe script detached
//!       AwaitPort      poll the probe port (10 × 2s)
//! ```
//!
//! The first failing step makes the node Faulty. Once the probe script
//! has been copied, teardown (kill session processes, delete the script)
//! runs regardless of the outcome and its errors are ignored.
//!
//! All nodes are probed in one dispatcher run; the result is a
//! [`HealthReport`] partition which can optionally be written back to the
//! fleet directory.

pub mod error;
pub mod evaluator;
pub mod probe;

pub use error::{HealthError, HealthResult};
pub use evaluator::{FaultyNode, HealthEvaluator, HealthReport};
pub use probe::{NodeProbe, ProbeFailure, ProbeSettings, ProbeState, ProbeStep};
