//! Hostname → network address resolution for the host table.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;

use crate::error::{DeployError, DeployResult};

#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> DeployResult<IpAddr>;
}

/// System resolver. The first IPv4 address wins, else the first address.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

#[async_trait]
impl AddressResolver for DnsResolver {
    async fn resolve(&self, hostname: &str) -> DeployResult<IpAddr> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((hostname, 0))
            .await
            .map_err(|e| DeployError::Resolve {
                host: hostname.to_string(),
                reason: e.to_string(),
            })?
            .map(|sa| sa.ip())
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| DeployError::Resolve {
                host: hostname.to_string(),
                reason: "no addresses".to_string(),
            })
    }
}

/// Fixed hostname → address table.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addrs: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hostname: &str, addr: IpAddr) -> Self {
        self.addrs.insert(hostname.to_string(), addr);
        self
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self, hostname: &str) -> DeployResult<IpAddr> {
        self.addrs
            .get(hostname)
            .copied()
            .ok_or_else(|| DeployError::Resolve {
                host: hostname.to_string(),
                reason: "unknown host".to_string(),
            })
    }
}
