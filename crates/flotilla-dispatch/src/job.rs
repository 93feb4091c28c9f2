//! Job and result types.

use std::fmt;

use flotilla_core::Node;
use thiserror::Error;

/// One unit of work bound to a node.
#[derive(Debug, Clone)]
pub struct Job<P> {
    /// Position of the job in the submitted list.
    pub id: usize,
    pub node: Node,
    pub payload: P,
}

impl<P> Job<P> {
    pub fn new(id: usize, node: Node, payload: P) -> Self {
        Self { id, node, payload }
    }
}

impl Job<()> {
    /// One payload-less job per node, ids following node order.
    pub fn per_node(nodes: &[Node]) -> Vec<Job<()>> {
        nodes
            .iter()
            .enumerate()
            .map(|(id, node)| Job::new(id, node.clone(), ()))
            .collect()
    }
}

/// Why a job did not produce an output.
#[derive(Debug, Error)]
pub enum JobError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl<E> JobError<E> {
    pub fn failed(&self) -> Option<&E> {
        match self {
            JobError::Failed(e) => Some(e),
            JobError::Panicked(_) => None,
        }
    }
}

/// The outcome of exactly one submitted job.
#[derive(Debug)]
pub struct JobResult<T, E> {
    pub job_id: usize,
    pub node: Node,
    /// Index of the worker that ran the job.
    pub worker: usize,
    pub outcome: Result<T, JobError<E>>,
}

impl<T, E> JobResult<T, E> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn output(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&JobError<E>> {
        self.outcome.as_ref().err()
    }
}

impl<T, E: fmt::Display> JobResult<T, E> {
    /// Error message, if the job failed.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(ToString::to_string)
    }
}
