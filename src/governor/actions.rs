//! State-changing governor calls.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

use super::contract::OpsGovernor;
use super::error::GovernorError;
use super::plan::QueryPlan;
use crate::rpc::{LedgerClient, SubmittedTransaction};
use crate::types::proposal::VoteDirection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted(SubmittedTransaction),
    /// The signer declined the prompt.
    Rejected,
}

pub struct GovernorActions<C> {
    client: Arc<C>,
    plan: QueryPlan,
    signer: Address,
}

impl<C: LedgerClient> GovernorActions<C> {
    pub fn new(client: Arc<C>, plan: QueryPlan, signer: Address) -> Self {
        Self {
            client,
            plan,
            signer,
        }
    }

    pub async fn create_proposal(
        &self,
        description: String,
        blocks_duration: u64,
        call_data: Bytes,
    ) -> Result<SubmitOutcome, GovernorError> {
        let call = OpsGovernor::createProposalCall {
            description,
            blocksDuration: U256::from(blocks_duration),
            callData: call_data,
        };
        self.submit("createProposal", call.abi_encode().into()).await
    }

    pub async fn cast_vote(
        &self,
        id: u64,
        direction: VoteDirection,
    ) -> Result<SubmitOutcome, GovernorError> {
        let call = OpsGovernor::voteCall {
            id: U256::from(id),
            direction: direction.code(),
        };
        self.submit("vote", call.abi_encode().into()).await
    }

    pub async fn execute(&self, id: u64) -> Result<SubmitOutcome, GovernorError> {
        let call = OpsGovernor::executeProposalCall { id: U256::from(id) };
        self.submit("executeProposal", call.abi_encode().into()).await
    }

    /// Send a call to the governor. A declined prompt is a normal outcome,
    /// not an error.
    pub async fn submit(&self, action: &str, data: Bytes) -> Result<SubmitOutcome, GovernorError> {
        match self
            .client
            .send_transaction(self.signer, self.plan.governor, data)
            .await
            .map_err(GovernorError::from)
        {
            Ok(tx) => {
                if tx.success {
                    tracing::info!("{} mined in transaction {}", action, tx.hash);
                } else {
                    tracing::warn!("{} reverted in transaction {}", action, tx.hash);
                }
                Ok(SubmitOutcome::Submitted(tx))
            }
            Err(e) if e.is_user_rejected() => {
                tracing::info!("{} rejected by user", action);
                Ok(SubmitOutcome::Rejected)
            }
            Err(e) => {
                tracing::error!("{} failed: {}", action, e);
                Err(e)
            }
        }
    }
}
