//! Turning one dispatcher run into a phase outcome.

use std::fmt::Display;

use flotilla_dispatch::Dispatched;
use tracing::{error, info};

use crate::error::{DeployError, DeployResult};

/// Every job must have succeeded; otherwise the phase fails with the
/// complete list of per-node failures. Outputs come back in job order.
pub(crate) fn settle<T, E: Display>(
    phase: &'static str,
    dispatched: Dispatched<T, E>,
) -> DeployResult<Vec<T>> {
    let results = dispatched.into_ordered();
    let total = results.len();

    let mut outputs = Vec::with_capacity(total);
    let mut failures = Vec::new();
    for result in results {
        match result.outcome {
            Ok(output) => outputs.push(output),
            Err(e) => failures.push((result.node.hostname, e.to_string())),
        }
    }

    if failures.is_empty() {
        info!(phase, jobs = total, "phase completed");
        return Ok(outputs);
    }

    error!(phase, failed = failures.len(), total, "phase failed");
    Err(DeployError::PhaseFailed {
        phase,
        failed: failures.len(),
        total,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use flotilla_core::Node;
    use flotilla_dispatch::{Dispatcher, Job};

    use super::*;

    fn jobs() -> Vec<Job<u32>> {
        (0..4)
            .map(|i| Job::new(i, Node::new(format!("n{i}"), i as u64), i as u32))
            .collect()
    }

    #[tokio::test]
    async fn all_ok_returns_outputs_in_job_order() {
        let dispatched = Dispatcher::new(3)
            .run("test", jobs(), |job| async move { Ok::<_, String>(job.payload * 2) })
            .await;
        assert_eq!(settle("test", dispatched).unwrap(), vec![0, 2, 4, 6]);
    }

    #[tokio::test]
    async fn failures_are_all_collected() {
        let dispatched = Dispatcher::new(3)
            .run("test", jobs(), |job| async move {
                if job.payload % 2 == 1 {
                    Err(format!("odd {}", job.payload))
                } else {
                    Ok(())
                }
            })
            .await;

        match settle("launch", dispatched) {
            Err(DeployError::PhaseFailed {
                phase,
                failed,
                total,
                failures,
            }) => {
                assert_eq!(phase, "launch");
                assert_eq!((failed, total), (2, 4));
                assert_eq!(
                    failures,
                    vec![
                        ("n1".to_string(), "odd 1".to_string()),
                        ("n3".to_string(), "odd 3".to_string()),
                    ]
                );
            }
            other => panic!("expected phase failure, got {other:?}"),
        }
    }
}
