use alloy::primitives::{Address, U256};

use super::contract::{to_u64, OpsGovernor};
use super::error::GovernorError;
use super::reader::GovernorReader;
use crate::rpc::LedgerClient;

/// Entries fetched per registry page.
pub const REGISTRY_BATCH_SIZE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registry {
    Tokens,
    Protocols,
    Utils,
}

impl Registry {
    pub fn name(self) -> &'static str {
        match self {
            Registry::Tokens => "tokens",
            Registry::Protocols => "protocols",
            Registry::Utils => "utils",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernorOverview {
    pub managers: Vec<Address>,
    pub operators: Vec<Address>,
    pub tokens: Vec<Address>,
    pub protocols: Vec<Address>,
    pub utils: Vec<Address>,
}

pub async fn load_overview<C: LedgerClient>(
    reader: &GovernorReader<C>,
) -> Result<GovernorOverview, GovernorError> {
    let (num_tokens, num_protocols, num_utils) = tokio::try_join!(
        registered_count(reader, Registry::Tokens),
        registered_count(reader, Registry::Protocols),
        registered_count(reader, Registry::Utils),
    )?;

    let (managers, operators, tokens, protocols, utils) = tokio::try_join!(
        reader.managers(),
        reader.operators(),
        load_registry(reader, Registry::Tokens, num_tokens),
        load_registry(reader, Registry::Protocols, num_protocols),
        load_registry(reader, Registry::Utils, num_utils),
    )?;

    Ok(GovernorOverview {
        managers,
        operators,
        tokens,
        protocols,
        utils,
    })
}

pub async fn registered_count<C: LedgerClient>(
    reader: &GovernorReader<C>,
    registry: Registry,
) -> Result<u64, GovernorError> {
    let count = match registry {
        Registry::Tokens => reader.read(OpsGovernor::getNumRegisteredTokensCall {}).await?,
        Registry::Protocols => {
            reader
                .read(OpsGovernor::getNumRegisteredProtocolsCall {})
                .await?
        }
        Registry::Utils => reader.read(OpsGovernor::getNumRegisteredUtilsCall {}).await?,
    };
    to_u64(count, registry.name())
}

/// Entries `[start, end)` of a registry. The contract clamps `end`.
pub async fn registered_page<C: LedgerClient>(
    reader: &GovernorReader<C>,
    registry: Registry,
    start: u64,
    end: u64,
) -> Result<Vec<Address>, GovernorError> {
    let (start, end) = (U256::from(start), U256::from(end));
    match registry {
        Registry::Tokens => {
            reader
                .read(OpsGovernor::getRegisteredTokensCall { start, end })
                .await
        }
        Registry::Protocols => {
            reader
                .read(OpsGovernor::getRegisteredProtocolsCall { start, end })
                .await
        }
        Registry::Utils => {
            reader
                .read(OpsGovernor::getRegisteredUtilsCall { start, end })
                .await
        }
    }
}

/// All `count` entries, fetched in sequential batches and concatenated in
/// order.
pub async fn load_registry<C: LedgerClient>(
    reader: &GovernorReader<C>,
    registry: Registry,
    count: u64,
) -> Result<Vec<Address>, GovernorError> {
    let batches = count.div_ceil(REGISTRY_BATCH_SIZE);
    let mut entries = Vec::with_capacity(count as usize);

    for batch in 0..batches {
        let start = batch * REGISTRY_BATCH_SIZE;
        let end = start + REGISTRY_BATCH_SIZE;
        entries.extend(registered_page(reader, registry, start, end).await?);
    }

    tracing::debug!("Loaded {} registered {}", entries.len(), registry.name());
    Ok(entries)
}
