use std::path::Path;

use anyhow::bail;
use flotilla_deploy::MaintenanceSummary;

use super::Context;

pub async fn provision(ctx: &Context, script: &Path, hosts: &[String], sudo: bool) -> anyhow::Result<()> {
    let nodes = ctx.resolve_hosts(hosts).await?;
    let summary =
        flotilla_deploy::provision(&ctx.transport()?, &ctx.dispatcher, &nodes, script, sudo).await?;
    finish("provisioned", &summary)
}

pub async fn cleanup(ctx: &Context, hosts: &[String], app_path: Option<&str>) -> anyhow::Result<()> {
    let nodes = ctx.resolve_hosts(hosts).await?;
    let app_path = app_path.unwrap_or(&ctx.config.app_path);
    let summary = flotilla_deploy::cleanup(&ctx.transport()?, &ctx.dispatcher, &nodes, app_path).await;
    finish("cleaned up", &summary)
}

fn finish(verb: &str, summary: &MaintenanceSummary) -> anyhow::Result<()> {
    println!("{}/{} node(s) {verb}", summary.succeeded.len(), summary.total());
    for (host, message) in &summary.failed {
        println!("  ✗ {host}: {message}");
    }
    if !summary.all_ok() {
        bail!("{} node(s) failed", summary.failed.len());
    }
    Ok(())
}
