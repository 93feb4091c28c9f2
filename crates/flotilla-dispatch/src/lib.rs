//! flotilla-dispatch: generic worker pool for per-node jobs.
//!
//! Every orchestration phase (health probing, bootstrap, host-table
//! distribution, launch) is one `Dispatcher::run` over a list of jobs.
//!
//! # Architecture
//!
//! ```text
//! Dispatcher::run(jobs, job_fn)
//!   ├── job queue (mpsc, capacity = jobs.len())
//!   ├── W = min(pool_size, jobs.len()) worker tasks
//!   │   └── per job: spawned task running job_fn → JobResult
//!   └── result queue (mpsc, capacity = jobs.len())
//!       └── barrier: caller receives exactly jobs.len() results
//! ```
//!
//! A failing (or panicking) job only affects its own `JobResult`.

pub mod dispatcher;
pub mod job;

pub use dispatcher::{Dispatched, Dispatcher};
pub use job::{Job, JobError, JobResult};
