use std::env;

use alloy::primitives::Address;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url_env_var: String,
    /// Deployed OpsGovernor on this chain, if any.
    #[serde(default)]
    pub governor_address: Option<Address>,
    /// Deployment block; point lookups never scan below it.
    #[serde(default)]
    pub start_block: u64,
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl ChainConfig {
    /// RPC URL from the environment variable this chain names.
    pub fn rpc_url(&self) -> anyhow::Result<String> {
        env::var(&self.rpc_url_env_var).map_err(|_| {
            anyhow::anyhow!(
                "RPC URL env var {} for chain {} is not set",
                self.rpc_url_env_var,
                self.name
            )
        })
    }
}
