//! Fixed-size worker pool with an end-of-phase barrier.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::job::{Job, JobError, JobResult};

/// Runs jobs over a pool of at most `pool_size` workers.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    pool_size: usize,
}

/// All results of one `Dispatcher::run`, in completion order.
#[derive(Debug)]
pub struct Dispatched<T, E> {
    /// Number of workers that were spawned.
    pub workers: usize,
    pub results: Vec<JobResult<T, E>>,
}

impl<T, E> Dispatched<T, E> {
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(JobResult::is_ok)
    }

    pub fn failures(&self) -> Vec<&JobResult<T, E>> {
        self.results.iter().filter(|r| !r.is_ok()).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Results sorted by job id (submission order).
    pub fn into_ordered(mut self) -> Vec<JobResult<T, E>> {
        self.results.sort_by_key(|r| r.job_id);
        self.results
    }
}

impl Dispatcher {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size: pool_size.max(1),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Workers spawned for a run over `jobs` jobs.
    pub fn worker_count(&self, jobs: usize) -> usize {
        self.pool_size.min(jobs)
    }

    /// Run `job_fn` once per job and wait for every result.
    ///
    /// Returns exactly `jobs.len()` results. A job's failure or panic is
    /// recorded in its own result and never stops sibling jobs.
    pub async fn run<P, T, E, F, Fut>(
        &self,
        phase: &str,
        jobs: Vec<Job<P>>,
        job_fn: F,
    ) -> Dispatched<T, E>
    where
        P: Send + 'static,
        T: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        F: Fn(Job<P>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let total = jobs.len();
        let workers = self.worker_count(total);
        if total == 0 {
            debug!(%phase, "no jobs to dispatch");
            return Dispatched {
                workers: 0,
                results: Vec::new(),
            };
        }

        // Both queues are sized to the job count so neither side blocks.
        let (job_tx, job_rx) = mpsc::channel::<Job<P>>(total);
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult<T, E>>(total);

        for job in jobs {
            if job_tx.send(job).await.is_err() {
                error!(%phase, "job queue closed before all jobs were queued");
            }
        }
        drop(job_tx);

        let job_rx = Arc::new(Mutex::new(job_rx));
        let job_fn = Arc::new(job_fn);
        let phase_name: Arc<str> = Arc::from(phase);

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let job_fn = Arc::clone(&job_fn);
            let phase = Arc::clone(&phase_name);

            handles.push(tokio::spawn(async move {
                debug!(%phase, worker, "worker started");
                loop {
                    let next = job_rx.lock().await.recv().await;
                    let Some(job) = next else { break };

                    let job_id = job.id;
                    let node = job.node.clone();
                    debug!(%phase, worker, job = job_id, host = %node.hostname, "job started");

                    let outcome = match tokio::spawn((*job_fn)(job)).await {
                        Ok(Ok(output)) => Ok(output),
                        Ok(Err(e)) => Err(JobError::Failed(e)),
                        Err(join_err) => Err(JobError::Panicked(join_err.to_string())),
                    };

                    match &outcome {
                        Ok(_) => debug!(%phase, worker, host = %node.hostname, "job succeeded"),
                        Err(e) => warn!(%phase, worker, host = %node.hostname, error = %e, "job failed"),
                    }

                    let result = JobResult {
                        job_id,
                        node,
                        worker,
                        outcome,
                    };
                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
                debug!(%phase, worker, "worker finished");
            }));
        }
        drop(result_tx);

        let mut results = Vec::with_capacity(total);
        while results.len() < total {
            match result_rx.recv().await {
                Some(result) => results.push(result),
                None => break,
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(%phase, error = %e, "worker task aborted");
            }
        }

        if results.len() != total {
            error!(%phase, expected = total, received = results.len(), "missing job results");
        }

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        info!(%phase, jobs = total, workers, failed, "phase dispatched");

        Dispatched { workers, results }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(flotilla_core::DEFAULT_WORKERS)
    }
}
