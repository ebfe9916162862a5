use alloy::primitives::Address;

use super::error::GovernorError;
use crate::rpc::LedgerClient;
use crate::types::config::chain::ChainConfig;

/// Where governor queries go for the active connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPlan {
    pub chain_id: u64,
    pub governor: Address,
    /// Lower bound for event scans.
    pub deployment_block: u64,
}

impl QueryPlan {
    /// Resolve the plan for the connected chain. Re-run whenever the
    /// connection or the deployment table changes.
    pub fn derive(
        connected_chain: Option<u64>,
        deployments: &[ChainConfig],
    ) -> Result<QueryPlan, GovernorError> {
        let chain_id = connected_chain.ok_or(GovernorError::ConnectRequired)?;

        let deployment = deployments
            .iter()
            .find(|d| d.chain_id == chain_id)
            .ok_or(GovernorError::UnsupportedNetwork { chain_id })?;

        let governor = deployment
            .governor_address
            .ok_or(GovernorError::UnsupportedNetwork { chain_id })?;

        Ok(QueryPlan {
            chain_id,
            governor,
            deployment_block: deployment.start_block,
        })
    }

    /// Resolve the plan for the chain `client` actually serves.
    pub async fn for_client<C: LedgerClient>(
        client: Option<&C>,
        deployments: &[ChainConfig],
    ) -> Result<QueryPlan, GovernorError> {
        let connected_chain = match client {
            Some(client) => Some(client.get_chain_id().await?),
            None => None,
        };
        Self::derive(connected_chain, deployments)
    }
}
