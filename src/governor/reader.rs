use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;

use super::contract::{to_u64, OpsGovernor};
use super::error::GovernorError;
use super::events::{EventWindowAggregator, GovernorEvent};
use super::plan::QueryPlan;
use crate::rpc::LedgerClient;
use crate::types::proposal::{LogPosition, ProposalRecord, ProposalStatus, VoteDirection, VoteRecord};

/// Anything that can serve proposals by id.
#[async_trait]
pub trait ProposalSource: Send + Sync {
    async fn num_proposals(&self) -> Result<u64, GovernorError>;

    async fn fetch_proposal(&self, id: u64) -> Result<ProposalRecord, GovernorError>;
}

/// Typed reads against one OpsGovernor deployment.
pub struct GovernorReader<C> {
    client: Arc<C>,
    plan: QueryPlan,
    events: EventWindowAggregator<C>,
}

impl<C: LedgerClient> GovernorReader<C> {
    pub fn new(client: Arc<C>, plan: QueryPlan) -> Self {
        let events = EventWindowAggregator::new(client.clone(), plan.governor);
        Self {
            client,
            plan,
            events,
        }
    }

    pub fn with_windows(mut self, window_blocks: u64, concurrency: usize) -> Self {
        self.events = self
            .events
            .with_window_blocks(window_blocks)
            .with_concurrency(concurrency);
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn events(&self) -> &EventWindowAggregator<C> {
        &self.events
    }

    pub async fn read<T: SolCall + Send>(&self, call: T) -> Result<T::Return, GovernorError> {
        let data = self
            .client
            .call(self.plan.governor, call.abi_encode().into())
            .await?;
        T::abi_decode_returns(&data)
            .map_err(|e| GovernorError::Decode(format!("{} result: {}", T::SIGNATURE, e)))
    }

    pub async fn current_block(&self) -> Result<u64, GovernorError> {
        Ok(self.client.get_block_number().await?)
    }

    pub async fn proposal_count(&self) -> Result<u64, GovernorError> {
        let count = self.read(OpsGovernor::getNumProposalsCall {}).await?;
        to_u64(count, "proposal count")
    }

    pub async fn proposal_snapshot(&self, id: u64) -> Result<OpsGovernor::Proposal, GovernorError> {
        self.read(OpsGovernor::getProposalCall { id: U256::from(id) })
            .await
    }

    /// Block of the proposal's `ProposalCreated` event.
    pub async fn creation_block(&self, id: u64) -> Result<u64, GovernorError> {
        self.events
            .fetch_point_block(GovernorEvent::ProposalCreated, id, self.plan.deployment_block)
            .await?
            .ok_or_else(|| {
                GovernorError::InvalidRecord(format!("proposal {} has no creation event", id))
            })
    }

    /// Block of the proposal's `ProposalExecuted` event, 0 if unexecuted.
    pub async fn execution_block(&self, id: u64, from_block: u64) -> Result<u64, GovernorError> {
        Ok(self
            .events
            .fetch_point_block(GovernorEvent::ProposalExecuted, id, from_block)
            .await?
            .unwrap_or(0))
    }

    pub async fn load_proposal(&self, id: u64) -> Result<ProposalRecord, GovernorError> {
        let (snapshot, start_block) =
            tokio::try_join!(self.proposal_snapshot(id), self.creation_block(id))?;
        let executed_block = self.execution_block(id, start_block).await?;
        record_from_snapshot(id, snapshot, start_block, executed_block)
    }

    /// Re-read a proposal's mutable fields, keeping its creation block.
    pub async fn refresh_proposal(
        &self,
        previous: &ProposalRecord,
        executed_block: u64,
    ) -> Result<ProposalRecord, GovernorError> {
        let snapshot = self.proposal_snapshot(previous.id).await?;
        record_from_snapshot(previous.id, snapshot, previous.start_block, executed_block)
    }

    /// Ids of proposals still open for voting, newest first.
    pub async fn active_proposal_ids(&self) -> Result<Vec<u64>, GovernorError> {
        let ids = self.read(OpsGovernor::getActiveProposalsIdsCall {}).await?;
        ids.into_iter()
            .rev()
            .map(|id| to_u64(id, "proposal id"))
            .collect()
    }

    pub async fn is_executable(&self, id: u64) -> Result<bool, GovernorError> {
        self.read(OpsGovernor::getIsProposalExecutableCall { id: U256::from(id) })
            .await
    }

    pub async fn managers(&self) -> Result<Vec<Address>, GovernorError> {
        self.read(OpsGovernor::getManagersCall {}).await
    }

    pub async fn operators(&self) -> Result<Vec<Address>, GovernorError> {
        self.read(OpsGovernor::getOperatorsCall {}).await
    }
}

#[async_trait]
impl<C: LedgerClient> ProposalSource for GovernorReader<C> {
    async fn num_proposals(&self) -> Result<u64, GovernorError> {
        self.proposal_count().await
    }

    async fn fetch_proposal(&self, id: u64) -> Result<ProposalRecord, GovernorError> {
        self.load_proposal(id).await
    }
}

pub fn record_from_snapshot(
    id: u64,
    snapshot: OpsGovernor::Proposal,
    start_block: u64,
    executed_block: u64,
) -> Result<ProposalRecord, GovernorError> {
    let status = ProposalStatus::try_from(snapshot.status).map_err(|code| {
        GovernorError::Decode(format!("proposal {} status code {}", id, code))
    })?;

    Ok(ProposalRecord {
        id,
        proposer: snapshot.proposer,
        description: snapshot.description,
        call_data: snapshot.callData,
        votes_for: snapshot.votesFor,
        votes_against: snapshot.votesAgainst,
        status,
        start_block,
        end_block: to_u64(snapshot.deadline, "deadline")?,
        executed_block,
    })
}

pub fn decode_vote(log: &Log) -> Result<VoteRecord, GovernorError> {
    let event = OpsGovernor::Vote::decode_log_data(log.data())
        .map_err(|e| GovernorError::Decode(format!("Vote log: {}", e)))?;
    let direction = VoteDirection::try_from(event.direction)
        .map_err(|code| GovernorError::Decode(format!("vote direction {}", code)))?;

    Ok(VoteRecord {
        proposal_id: to_u64(event.id, "proposal id")?,
        voter: event.voter,
        direction,
        voting_power: event.votingPower,
        reason: event.reason,
        position: LogPosition::from_log(log),
    })
}

/// Proposal id carried by a `ProposalCreated` log.
pub fn decode_created_id(log: &Log) -> Result<u64, GovernorError> {
    let event = OpsGovernor::ProposalCreated::decode_log_data(log.data())
        .map_err(|e| GovernorError::Decode(format!("ProposalCreated log: {}", e)))?;
    to_u64(event.id, "proposal id")
}
