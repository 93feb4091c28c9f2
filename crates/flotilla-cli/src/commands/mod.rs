pub mod deploy;
pub mod health;
pub mod maintenance;
pub mod nodes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, bail};
use flotilla_core::{FlotillaConfig, Node};
use flotilla_dispatch::Dispatcher;
use flotilla_fleet::{FileDirectory, FleetDirectory};
use flotilla_remote::{ColorRegistry, SshConfig, Transport};
use tracing::debug;

/// Config file values with command-line overrides applied.
pub struct Context {
    pub config: FlotillaConfig,
    group: Option<String>,
    directory: Option<PathBuf>,
    pub dispatcher: Dispatcher,
}

impl Context {
    pub fn load(
        config_path: Option<&Path>,
        group: Option<String>,
        directory: Option<PathBuf>,
        workers: Option<usize>,
    ) -> anyhow::Result<Self> {
        let config = FlotillaConfig::load(config_path).context("loading config")?;
        let workers = workers.unwrap_or(config.workers);
        if workers == 0 {
            bail!("--workers must be at least 1");
        }
        debug!(config = ?config_path, workers, "configuration loaded");
        Ok(Self {
            group: group.or_else(|| config.group.clone()),
            directory: directory.or_else(|| config.directory.clone()),
            dispatcher: Dispatcher::new(workers),
            config,
        })
    }

    pub fn group(&self) -> anyhow::Result<&str> {
        match &self.group {
            Some(g) => Ok(g.as_str()),
            None => bail!("no node group given: pass --group or set `group` in the config"),
        }
    }

    pub fn directory(&self) -> anyhow::Result<Arc<dyn FleetDirectory>> {
        match &self.directory {
            Some(path) => Ok(Arc::new(FileDirectory::new(path))),
            None => bail!("no fleet directory given: pass --directory or set `directory` in the config"),
        }
    }

    /// ssh/scp transport logging in as the group's user.
    pub fn transport(&self) -> anyhow::Result<Transport> {
        let user = self.config.user_for(self.group()?);
        let ssh = SshConfig::new(user)
            .with_port(self.config.ssh_port)
            .with_identity(self.config.ssh_key.clone());
        Ok(Transport::ssh(ssh, Arc::new(ColorRegistry::new())))
    }

    /// `all` selects the whole group; otherwise hostnames are looked up in
    /// the group, unknown ones kept with id 0.
    pub async fn resolve_hosts(&self, hosts: &[String]) -> anyhow::Result<Vec<Node>> {
        let group = self.group()?;
        let members = self.directory()?.get_nodes_for_group(group).await?;
        Ok(select_hosts(members, hosts))
    }
}

fn select_hosts(members: Vec<Node>, hosts: &[String]) -> Vec<Node> {
    if hosts.iter().any(|h| h == "all") {
        return members;
    }
    hosts
        .iter()
        .map(|h| {
            members
                .iter()
                .find(|m| m.hostname == *h)
                .cloned()
                .unwrap_or_else(|| Node::new(h.clone(), 0))
        })
        .collect()
}
