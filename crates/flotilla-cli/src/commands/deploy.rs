use std::path::PathBuf;

use clap::Args;
use flotilla_deploy::plan::HOSTS_ARTIFACT;
use flotilla_deploy::{DeployRequest, Pipeline};

use super::Context;

#[derive(Args)]
pub struct DeployArgs {
    /// Application repository, must end in `.git`
    git_url: String,
    /// Number of nodes to deploy onto
    #[arg(short = 'n', long, default_value_t = 1)]
    nodes: usize,
    /// Instances per node
    #[arg(short, long, default_value_t = 1)]
    scale: usize,
    /// Branch to deploy (default: `branch` from the config)
    #[arg(short, long)]
    branch: Option<String>,
    /// Remote app directory (default: `app_path` from the config)
    #[arg(long)]
    app_path: Option<String>,
    /// Comma-separated hostnames to leave out
    #[arg(long, value_delimiter = ',')]
    blacklist: Vec<String>,
    /// Shuffle candidate nodes before picking
    #[arg(long)]
    shuffle: bool,
    /// Seed for node and instance shuffles
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    skip_health_check: bool,
    /// Start instances with sudo
    #[arg(long)]
    sudo: bool,
    /// Extra variables: VAR1=VAL1,VAR2=VAL2
    #[arg(short, long, default_value = "")]
    env: String,
    /// Install and start node_exporter on every node
    #[arg(long)]
    node_exporter: bool,
    /// Do not write the host table to hosts_deployment.txt
    #[arg(long)]
    no_hosts_file: bool,
    /// Write service discovery targets to this file
    #[arg(long)]
    sd_path: Option<PathBuf>,
}

impl DeployArgs {
    fn into_request(self, ctx: &Context, group: &str) -> DeployRequest {
        let mut request = DeployRequest::new(self.git_url, group);
        request.node_count = self.nodes;
        request.scale = self.scale;
        request.branch = self.branch.unwrap_or_else(|| ctx.config.branch.clone());
        request.app_path = self.app_path.unwrap_or_else(|| ctx.config.app_path.clone());
        request.blacklist = self.blacklist;
        request.shuffle_nodes = self.shuffle;
        request.seed = self.seed;
        request.skip_health_check = self.skip_health_check;
        request.sudo = self.sudo;
        request.env_overrides = self.env;
        request.node_exporter = self.node_exporter;
        request.hosts_file = (!self.no_hosts_file).then(|| PathBuf::from(HOSTS_ARTIFACT));
        request.sd_path = self.sd_path;
        request
    }
}

pub async fn deploy(ctx: &Context, args: DeployArgs) -> anyhow::Result<()> {
    let group = ctx.group()?;
    let request = args.into_request(ctx, group);
    let pipeline = Pipeline::new(ctx.transport()?, ctx.directory()?, ctx.dispatcher);

    match pipeline.deploy(&request).await {
        Ok(report) => {
            println!(
                "✓ Deployed {} instance(s) to {} node(s) in {:.1}s",
                report.instances,
                report.nodes.len(),
                report.elapsed.as_secs_f64()
            );
            for node in &report.nodes {
                println!("  {node}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Deployment failed: {e}");
            Err(e.into())
        }
    }
}
