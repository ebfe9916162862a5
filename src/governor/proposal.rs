//! Live view of a single proposal and its votes.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::rpc::types::Log;
use tokio::sync::mpsc;

use super::error::GovernorError;
use super::events::GovernorEvent;
use super::merge::MergeSet;
use super::reader::{decode_vote, GovernorReader};
use super::scope::ViewScope;
use crate::rpc::LedgerClient;
use crate::types::proposal::{ProposalRecord, VoteRecord};

#[derive(Debug)]
enum LiveEvent {
    Vote(Log),
    Executed(Log),
}

/// What a live delivery changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    VoteAdded(VoteRecord),
    /// Already present from history or an earlier delivery.
    VoteRedelivered,
    Executed { block: u64 },
}

pub struct ProposalView<C: LedgerClient> {
    reader: Arc<GovernorReader<C>>,
    proposal: ProposalRecord,
    votes: MergeSet<VoteRecord>,
    total_voting_power: u64,
    is_executable: bool,
    current_block: u64,
    live: mpsc::Receiver<LiveEvent>,
    scope: ViewScope,
}

impl<C: LedgerClient> ProposalView<C> {
    pub async fn load(reader: Arc<GovernorReader<C>>, id: u64) -> Result<Self, GovernorError> {
        Self::load_in(ViewScope::new(), reader, id)
            .await?
            .ok_or_else(|| GovernorError::InvalidRecord(format!("view of proposal {} torn down", id)))
    }

    /// Load within `scope`. Returns `None` if the scope was torn down before
    /// loading finished; nothing fetched after that point is kept.
    pub async fn load_in(
        scope: ViewScope,
        reader: Arc<GovernorReader<C>>,
        id: u64,
    ) -> Result<Option<Self>, GovernorError> {
        let result = Self::load_live(scope.clone(), reader, id).await;
        if let Err(e) = &result {
            tracing::warn!("Loading proposal {} failed: {}", id, e);
            scope.teardown();
        }
        result
    }

    async fn load_live(
        scope: ViewScope,
        reader: Arc<GovernorReader<C>>,
        id: u64,
    ) -> Result<Option<Self>, GovernorError> {
        let (tx, live) = mpsc::channel(256);

        // Subscribe before the historical fetch so nothing emitted while it
        // runs is missed; overlap is absorbed by the merge.
        let votes_sub = reader.events().subscribe(GovernorEvent::Vote, Some(id)).await?;
        scope.forward(votes_sub, tx.clone(), LiveEvent::Vote);
        let executed_sub = reader
            .events()
            .subscribe(GovernorEvent::ProposalExecuted, Some(id))
            .await?;
        scope.forward(executed_sub, tx, LiveEvent::Executed);

        let current_block = reader.current_block().await?;
        let proposal = reader.load_proposal(id).await?;
        let vote_logs = reader
            .events()
            .fetch_all(GovernorEvent::Vote, id, proposal.start_block, proposal.end_block)
            .await?;

        let mut votes = MergeSet::new();
        for log in &vote_logs {
            votes.merge(decode_vote(log)?);
        }

        let (total_voting_power, is_executable) = if proposal.start_block <= current_block {
            let (managers, executable) =
                tokio::try_join!(reader.managers(), reader.is_executable(id))?;
            (managers.len() as u64, executable)
        } else {
            (0, false)
        };

        if !scope.is_live() {
            tracing::debug!("Discarding load of proposal {} after teardown", id);
            return Ok(None);
        }

        tracing::info!(
            "Loaded proposal {} with {} vote(s) over blocks {}-{}",
            id,
            votes.len(),
            proposal.start_block,
            proposal.end_block
        );

        Ok(Some(Self {
            reader,
            proposal,
            votes,
            total_voting_power,
            is_executable,
            current_block,
            live,
            scope,
        }))
    }

    pub fn proposal(&self) -> &ProposalRecord {
        &self.proposal
    }

    /// Votes in emission order.
    pub fn votes(&self) -> Vec<&VoteRecord> {
        self.votes.sorted()
    }

    pub fn has_user_voted(&self, user: &Address) -> bool {
        self.votes.contains_key(&(self.proposal.id, *user))
    }

    pub fn is_executable(&self) -> bool {
        self.is_executable
    }

    /// Manager count once voting has started; 0 before that.
    pub fn total_voting_power(&self) -> u64 {
        self.total_voting_power
    }

    pub fn current_block(&self) -> u64 {
        self.current_block
    }

    pub fn scope(&self) -> &ViewScope {
        &self.scope
    }

    /// Merge one vote log. Returns the vote if it was not already present.
    pub fn apply_vote_log(&mut self, log: &Log) -> Result<Option<VoteRecord>, GovernorError> {
        let vote = decode_vote(log)?;
        if vote.proposal_id != self.proposal.id {
            return Ok(None);
        }
        self.observe_block(log);
        if self.votes.merge(vote.clone()) {
            Ok(Some(vote))
        } else {
            Ok(None)
        }
    }

    /// Wait for the next live delivery and fold it in. `Ok(None)` once the
    /// view is torn down.
    pub async fn next_update(&mut self) -> Result<Option<ViewUpdate>, GovernorError> {
        let event = match self.live.recv().await {
            Some(event) if self.scope.is_live() => event,
            _ => return Ok(None),
        };

        match event {
            LiveEvent::Vote(log) => match self.apply_vote_log(&log)? {
                Some(vote) => {
                    tracing::debug!("Vote from {} on proposal {}", vote.voter, vote.proposal_id);
                    let executable = self.reader.is_executable(self.proposal.id).await?;
                    if !self.scope.is_live() {
                        return Ok(None);
                    }
                    self.is_executable = executable;
                    self.refresh_voting_power().await?;
                    Ok(Some(ViewUpdate::VoteAdded(vote)))
                }
                None => Ok(Some(ViewUpdate::VoteRedelivered)),
            },
            LiveEvent::Executed(log) => {
                let block = log.block_number.unwrap_or(self.current_block);
                let (refreshed, executable) = tokio::try_join!(
                    self.reader.refresh_proposal(&self.proposal, block),
                    self.reader.is_executable(self.proposal.id)
                )?;
                if !self.scope.is_live() {
                    return Ok(None);
                }
                self.observe_block(&log);
                self.proposal = refreshed;
                self.is_executable = executable;
                tracing::info!("Proposal {} executed in block {}", self.proposal.id, block);
                Ok(Some(ViewUpdate::Executed { block }))
            }
        }
    }

    /// Poll the head and pick up the voting power once voting opens.
    pub async fn refresh_current_block(&mut self) -> Result<u64, GovernorError> {
        let head = self.reader.current_block().await?;
        if self.scope.is_live() {
            self.current_block = self.current_block.max(head);
            self.refresh_voting_power().await?;
        }
        Ok(self.current_block)
    }

    /// Release every subscription held by this view.
    pub fn teardown(self) {
        self.scope.teardown();
    }

    async fn refresh_voting_power(&mut self) -> Result<(), GovernorError> {
        if self.total_voting_power > 0 || self.proposal.start_block > self.current_block {
            return Ok(());
        }
        let managers = self.reader.managers().await?;
        if self.scope.is_live() {
            self.total_voting_power = managers.len() as u64;
        }
        Ok(())
    }

    fn observe_block(&mut self, log: &Log) {
        if let Some(block) = log.block_number {
            self.current_block = self.current_block.max(block);
        }
    }
}

impl<C: LedgerClient> Drop for ProposalView<C> {
    fn drop(&mut self) {
        self.scope.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::contract::OpsGovernor;
    use crate::governor::mock::{event_log, proposal_fixture, MockLedger};
    use alloy::primitives::U256;

    const ID: u64 = 7;

    fn vote(voter: Address) -> OpsGovernor::Vote {
        OpsGovernor::Vote {
            id: U256::from(ID),
            voter,
            direction: 1,
            votingPower: U256::from(1),
            reason: "too risky".into(),
        }
    }

    fn setup(head: u64) -> (Arc<MockLedger>, Arc<GovernorReader<MockLedger>>) {
        let ledger = Arc::new(MockLedger::new(head));
        let plan = ledger.plan();
        ledger.stub_proposal(ID, proposal_fixture(0, 12_050));
        ledger.push_log(event_log(
            plan.governor,
            &OpsGovernor::ProposalCreated {
                id: U256::from(ID),
                proposer: Address::repeat_byte(0x99),
                description: "rotate operators".into(),
                deadline: U256::from(12_050),
            },
            100,
            0,
        ));
        ledger.stub_call(
            OpsGovernor::getManagersCall {},
            vec![Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3)],
        );
        ledger.stub_call(
            OpsGovernor::getIsProposalExecutableCall { id: U256::from(ID) },
            false,
        );
        let reader = Arc::new(GovernorReader::new(ledger.clone(), plan));
        (ledger, reader)
    }

    #[tokio::test]
    async fn test_live_redelivery_does_not_duplicate_vote() {
        let (ledger, reader) = setup(13_000);
        let voter = Address::repeat_byte(0xab);
        let historical = event_log(ledger.plan().governor, &vote(voter), 5_000, 2);
        ledger.push_log(historical.clone());

        let mut view = ProposalView::load(reader, ID).await.unwrap();
        assert_eq!(view.votes().len(), 1);
        assert!(view.has_user_voted(&voter));
        assert_eq!(view.total_voting_power(), 3);

        ledger.emit(historical);
        assert_eq!(view.next_update().await.unwrap(), Some(ViewUpdate::VoteRedelivered));
        assert_eq!(view.votes().len(), 1);

        let other = Address::repeat_byte(0xcd);
        ledger.emit(event_log(ledger.plan().governor, &vote(other), 12_900, 0));
        match view.next_update().await.unwrap() {
            Some(ViewUpdate::VoteAdded(added)) => assert_eq!(added.voter, other),
            other => panic!("unexpected update {:?}", other),
        }
        assert_eq!(view.votes().len(), 2);
        assert_eq!(view.current_block(), 13_000);
    }

    #[tokio::test]
    async fn test_votes_fetched_over_proposal_lifetime() {
        let (ledger, reader) = setup(13_000);

        let _view = ProposalView::load(reader, ID).await.unwrap();

        let vote_topic = GovernorEvent::Vote.topic0();
        let mut ranges: Vec<_> = ledger
            .recorded_filters()
            .iter()
            .filter(|f| f.topics[0].matches(&vote_topic))
            .map(|f| (f.get_from_block().unwrap(), f.get_to_block().unwrap()))
            .collect();
        ranges.sort();
        assert_eq!(ranges, vec![(100, 5100), (5100, 10100), (10100, 12050)]);
    }

    #[tokio::test]
    async fn test_execution_refreshes_proposal() {
        let (ledger, reader) = setup(13_000);
        let mut view = ProposalView::load(reader, ID).await.unwrap();
        assert_eq!(view.proposal().executed_block, 0);

        ledger.stub_proposal(ID, proposal_fixture(2, 12_050));
        ledger.emit(event_log(
            ledger.plan().governor,
            &OpsGovernor::ProposalExecuted {
                id: U256::from(ID),
                status: 2,
            },
            13_010,
            0,
        ));

        assert_eq!(
            view.next_update().await.unwrap(),
            Some(ViewUpdate::Executed { block: 13_010 })
        );
        assert_eq!(view.proposal().executed_block, 13_010);
        assert_eq!(view.proposal().start_block, 100);
        assert!(view.proposal().is_executed());
    }

    #[tokio::test]
    async fn test_refresh_current_block_tracks_head() {
        let (ledger, reader) = setup(13_000);
        let mut view = ProposalView::load(reader, ID).await.unwrap();

        ledger.set_head(13_500);
        assert_eq!(view.refresh_current_block().await.unwrap(), 13_500);
        assert_eq!(view.current_block(), 13_500);
    }

    #[tokio::test]
    async fn test_teardown_releases_live_feeds() {
        let (ledger, reader) = setup(13_000);
        let view = ProposalView::load(reader, ID).await.unwrap();
        assert_eq!(ledger.live_subscribers(), 2);

        view.teardown();
        ledger.wait_for_unsubscribed().await;
        assert_eq!(ledger.live_subscribers(), 0);
    }

    #[tokio::test]
    async fn test_load_after_teardown_discards_results() {
        let (_ledger, reader) = setup(13_000);
        let scope = ViewScope::new();
        scope.teardown();

        let view = ProposalView::load_in(scope, reader, ID).await.unwrap();
        assert!(view.is_none());
    }

    #[tokio::test]
    async fn test_failed_load_releases_live_feeds() {
        let ledger = Arc::new(MockLedger::new(13_000));
        let plan = ledger.plan();
        // Stored proposal without a creation event
        ledger.stub_proposal(9, proposal_fixture(0, 12_050));
        let reader = Arc::new(GovernorReader::new(ledger.clone(), plan));

        assert!(ProposalView::load(reader, 9).await.is_err());

        ledger.wait_for_unsubscribed().await;
        assert_eq!(ledger.live_subscribers(), 0);
    }
}
