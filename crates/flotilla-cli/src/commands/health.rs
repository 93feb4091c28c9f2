use std::path::Path;

use anyhow::Context as _;
use flotilla_core::Node;
use flotilla_health::{HealthEvaluator, HealthReport};

use super::Context;

pub async fn health_check(ctx: &Context, remove_faulty: bool, output: Option<&Path>) -> anyhow::Result<()> {
    let group = ctx.group()?;
    let evaluator = HealthEvaluator::new(ctx.transport()?, ctx.directory()?, ctx.dispatcher);
    let report = evaluator.check_group(group, remove_faulty).await?;

    print_report(&report);
    if remove_faulty && !report.all_healthy() {
        println!("Removed {} faulty node(s) from {group}", report.faulty_count());
    }
    if let Some(path) = output {
        std::fs::write(path, node_lines(&report.healthy))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote healthy nodes to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &HealthReport) {
    println!(
        "{} healthy, {} faulty",
        report.healthy_count(),
        report.faulty_count()
    );
    for node in &report.healthy {
        println!("  ✓ {node}");
    }
    for faulty in &report.faulty {
        println!("  ✗ {}: {}", faulty.node, faulty.reason);
    }
}

/// `hostname,id` per line.
fn node_lines(nodes: &[Node]) -> String {
    nodes
        .iter()
        .map(|n| format!("{},{}\n", n.hostname, n.id))
        .collect()
}
