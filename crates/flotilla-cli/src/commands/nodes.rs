use std::path::Path;

use super::Context;

pub async fn list(ctx: &Context) -> anyhow::Result<()> {
    let group = ctx.group()?;
    let nodes = ctx.directory()?.get_nodes_for_group(group).await?;
    println!("{} node(s) in {group}", nodes.len());
    for node in &nodes {
        println!("  {node}");
    }
    Ok(())
}

pub async fn execute(ctx: &Context, hostname: &str, command: &str) -> anyhow::Result<()> {
    ctx.transport()?.exec(hostname, command, true).await?;
    Ok(())
}

pub async fn transfer(ctx: &Context, hostname: &str, local: &Path, remote: &str) -> anyhow::Result<()> {
    ctx.transport()?.copy(hostname, local, remote).await?;
    println!("✓ Copied {} to {hostname}:{remote}", local.display());
    Ok(())
}
