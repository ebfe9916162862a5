use std::sync::Arc;

use alloy::rpc::types::Log;
use futures::future::try_join_all;
use tokio::sync::mpsc;

use super::error::GovernorError;
use super::events::GovernorEvent;
use super::merge::MergeSet;
use super::reader::{decode_created_id, GovernorReader};
use super::scope::ViewScope;
use crate::rpc::LedgerClient;
use crate::types::proposal::ProposalRecord;

/// Proposals still open for voting, newest first, kept current by
/// `ProposalCreated` events.
pub struct ActiveProposals<C: LedgerClient> {
    reader: Arc<GovernorReader<C>>,
    proposals: MergeSet<ProposalRecord>,
    live: mpsc::Receiver<Log>,
    scope: ViewScope,
}

impl<C: LedgerClient> ActiveProposals<C> {
    pub async fn load(reader: Arc<GovernorReader<C>>) -> Result<Self, GovernorError> {
        let scope = ViewScope::new();
        let result = Self::load_in(scope.clone(), reader).await;
        if let Err(e) = &result {
            tracing::warn!("Loading active proposals failed: {}", e);
            scope.teardown();
        }
        result
    }

    async fn load_in(
        scope: ViewScope,
        reader: Arc<GovernorReader<C>>,
    ) -> Result<Self, GovernorError> {
        let (tx, live) = mpsc::channel(64);

        let created = reader
            .events()
            .subscribe(GovernorEvent::ProposalCreated, None)
            .await?;
        scope.forward(created, tx, |log| log);

        let ids = reader.active_proposal_ids().await?;
        let records = try_join_all(ids.iter().map(|&id| reader.load_proposal(id))).await?;

        let mut proposals = MergeSet::new();
        proposals.merge_all(records);
        tracing::info!("Loaded {} active proposal(s)", proposals.len());

        Ok(Self {
            reader,
            proposals,
            live,
            scope,
        })
    }

    pub fn proposals(&self) -> Vec<&ProposalRecord> {
        self.proposals.sorted()
    }

    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Wait for the next newly created pending proposal and return its id.
    /// Known or non-pending proposals are skipped. `Ok(None)` once torn down.
    pub async fn next_created(&mut self) -> Result<Option<u64>, GovernorError> {
        loop {
            let log = match self.live.recv().await {
                Some(log) if self.scope.is_live() => log,
                _ => return Ok(None),
            };

            let id = decode_created_id(&log)?;
            if self.proposals.contains_key(&id) {
                continue;
            }

            let record = self.reader.load_proposal(id).await?;
            if !self.scope.is_live() {
                return Ok(None);
            }
            if !record.status.is_pending() {
                tracing::debug!("Skipping proposal {} created with status {}", id, record.status);
                continue;
            }

            self.proposals.merge(record);
            tracing::info!("New active proposal {}", id);
            return Ok(Some(id));
        }
    }

    pub fn teardown(self) {
        self.scope.teardown();
    }
}

impl<C: LedgerClient> Drop for ActiveProposals<C> {
    fn drop(&mut self) {
        self.scope.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::contract::OpsGovernor;
    use crate::governor::mock::{event_log, proposal_fixture, MockLedger};
    use alloy::primitives::{Address, U256};

    fn created(id: u64) -> OpsGovernor::ProposalCreated {
        OpsGovernor::ProposalCreated {
            id: U256::from(id),
            proposer: Address::repeat_byte(0x11),
            description: format!("proposal {}", id),
            deadline: U256::from(900),
        }
    }

    #[tokio::test]
    async fn test_new_pending_proposal_goes_first_once() {
        let ledger = Arc::new(MockLedger::new(500));
        let plan = ledger.plan();
        for id in [1u64, 2] {
            ledger.stub_proposal(id, proposal_fixture(0, 900));
            ledger.push_log(event_log(plan.governor, &created(id), 100 + id, 0));
        }
        ledger.stub_call(
            OpsGovernor::getActiveProposalsIdsCall {},
            vec![U256::from(1), U256::from(2)],
        );
        let reader = Arc::new(GovernorReader::new(ledger.clone(), plan));

        let mut active = ActiveProposals::load(reader).await.unwrap();
        let ids: Vec<u64> = active.proposals().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 1]);

        // Redelivery of a known proposal, then a rejected one, then a new pending one
        ledger.emit(event_log(plan.governor, &created(2), 102, 0));
        ledger.stub_proposal(3, proposal_fixture(1, 900));
        ledger.push_log(event_log(plan.governor, &created(3), 103, 0));
        ledger.emit(event_log(plan.governor, &created(3), 103, 0));
        ledger.stub_proposal(4, proposal_fixture(0, 900));
        ledger.push_log(event_log(plan.governor, &created(4), 104, 0));
        ledger.emit(event_log(plan.governor, &created(4), 104, 0));

        assert_eq!(active.next_created().await.unwrap(), Some(4));
        let ids: Vec<u64> = active.proposals().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![4, 2, 1]);
    }

    #[tokio::test]
    async fn test_failed_load_releases_subscription() {
        let ledger = Arc::new(MockLedger::new(500));
        let reader = Arc::new(GovernorReader::new(ledger.clone(), ledger.plan()));

        // getActiveProposalsIds is not stubbed, so the read fails
        assert!(ActiveProposals::load(reader).await.is_err());

        ledger.wait_for_unsubscribed().await;
        assert_eq!(ledger.live_subscribers(), 0);
    }
}
