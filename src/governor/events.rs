//! Windowed historical log queries.
//!
//! Providers cap the block span of one `eth_getLogs`, so a record's
//! lifetime `[start, end]` is split into windows of at most `W` blocks.
//! Windows may be in flight together but results are assembled in window
//! order, so callers see logs in emission order.

use std::collections::HashSet;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use futures::stream::{self, StreamExt};

use super::contract::OpsGovernor;
use super::error::GovernorError;
use crate::rpc::{LedgerClient, LogSubscription};
use crate::types::proposal::LogPosition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GovernorEvent {
    ProposalCreated,
    Vote,
    ProposalExecuted,
}

impl GovernorEvent {
    pub fn name(self) -> &'static str {
        match self {
            GovernorEvent::ProposalCreated => "ProposalCreated",
            GovernorEvent::Vote => "Vote",
            GovernorEvent::ProposalExecuted => "ProposalExecuted",
        }
    }

    pub fn topic0(self) -> B256 {
        match self {
            GovernorEvent::ProposalCreated => OpsGovernor::ProposalCreated::SIGNATURE_HASH,
            GovernorEvent::Vote => OpsGovernor::Vote::SIGNATURE_HASH,
            GovernorEvent::ProposalExecuted => OpsGovernor::ProposalExecuted::SIGNATURE_HASH,
        }
    }

    /// Filter for this event on `governor`, narrowed to one proposal when
    /// `record_id` is given. Every governor event indexes the id first.
    pub fn filter(self, governor: Address, record_id: Option<u64>) -> Filter {
        let filter = Filter::new()
            .address(governor)
            .event_signature(self.topic0());
        match record_id {
            Some(id) => filter.topic1(B256::from(U256::from(id))),
            None => filter,
        }
    }
}

/// Split `[start, end]` into inclusive windows no wider than `width` blocks.
///
/// Adjacent windows share their boundary block. `end < start` yields no
/// windows; `end == start` yields one single-block window.
pub fn split_windows(start: u64, end: u64, width: u64) -> Vec<(u64, u64)> {
    if end < start {
        return Vec::new();
    }
    if end == start {
        return vec![(start, end)];
    }

    let width = width.max(1);
    let count = (end - start).div_ceil(width);
    (0..count)
        .map(|i| {
            let from = start.saturating_add(i.saturating_mul(width));
            let to = start
                .saturating_add((i + 1).saturating_mul(width))
                .min(end);
            (from, to)
        })
        .collect()
}

pub struct EventWindowAggregator<C> {
    client: Arc<C>,
    governor: Address,
    window_blocks: u64,
    concurrency: usize,
}

impl<C: LedgerClient> EventWindowAggregator<C> {
    pub fn new(client: Arc<C>, governor: Address) -> Self {
        Self {
            client,
            governor,
            window_blocks: crate::types::config::app::DEFAULT_EVENT_WINDOW_BLOCKS,
            concurrency: crate::types::config::app::DEFAULT_WINDOW_CONCURRENCY,
        }
    }

    pub fn with_window_blocks(mut self, blocks: u64) -> Self {
        self.window_blocks = blocks.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn window_blocks(&self) -> u64 {
        self.window_blocks
    }

    /// All occurrences of `event` for `record_id` in `[start, end]`, in
    /// emission order.
    pub async fn fetch_all(
        &self,
        event: GovernorEvent,
        record_id: u64,
        start: u64,
        end: u64,
    ) -> Result<Vec<Log>, GovernorError> {
        let windows = split_windows(start, end, self.window_blocks);
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Fetching {} logs for {} over blocks {}-{} in {} window(s)",
            event.name(),
            record_id,
            start,
            end,
            windows.len()
        );

        let base = event.filter(self.governor, Some(record_id));
        let mut results = stream::iter(windows)
            .map(|(from, to)| self.query_window(&base, from, to))
            .buffered(self.concurrency);

        let mut logs = Vec::new();
        let mut seen = HashSet::new();
        while let Some(window_logs) = results.next().await {
            append_unique(&mut logs, &mut seen, window_logs?);
        }

        Ok(logs)
    }

    /// First occurrence of `event` for `record_id` between `from_block` and
    /// the current head, or `None`.
    pub async fn fetch_point(
        &self,
        event: GovernorEvent,
        record_id: u64,
        from_block: u64,
    ) -> Result<Option<Log>, GovernorError> {
        let head = self.client.get_block_number().await?;
        let windows = split_windows(from_block, head, self.window_blocks);

        let base = event.filter(self.governor, Some(record_id));
        let mut results = stream::iter(windows)
            .map(|(from, to)| self.query_window(&base, from, to))
            .buffered(self.concurrency);

        while let Some(window_logs) = results.next().await {
            if let Some(first) = window_logs?.into_iter().next() {
                return Ok(Some(first));
            }
        }

        Ok(None)
    }

    /// Block height of the first occurrence, if any.
    pub async fn fetch_point_block(
        &self,
        event: GovernorEvent,
        record_id: u64,
        from_block: u64,
    ) -> Result<Option<u64>, GovernorError> {
        let log = self.fetch_point(event, record_id, from_block).await?;
        Ok(log.and_then(|l| l.block_number))
    }

    /// Live feed of `event`, optionally narrowed to one record.
    pub async fn subscribe(
        &self,
        event: GovernorEvent,
        record_id: Option<u64>,
    ) -> Result<LogSubscription, GovernorError> {
        let filter = event.filter(self.governor, record_id);
        Ok(self.client.subscribe_logs(filter).await?)
    }

    async fn query_window(
        &self,
        base: &Filter,
        from: u64,
        to: u64,
    ) -> Result<Vec<Log>, GovernorError> {
        let filter = base.clone().from_block(from).to_block(to);
        let logs = self.client.get_logs(&filter).await.map_err(|e| {
            tracing::error!("Log query for blocks {}-{} failed: {}", from, to, e);
            GovernorError::from(e)
        })?;
        tracing::debug!("Window {}-{} returned {} log(s)", from, to, logs.len());
        Ok(logs)
    }
}

/// Append logs, dropping ones already delivered by the previous window.
fn append_unique(out: &mut Vec<Log>, seen: &mut HashSet<LogPosition>, logs: Vec<Log>) {
    for log in logs {
        let position = LogPosition::from_log(&log);
        if position != LogPosition::UNKNOWN && !seen.insert(position) {
            continue;
        }
        out.push(log);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governor::mock::{event_log, MockLedger};

    fn governor() -> Address {
        Address::repeat_byte(0x60)
    }

    fn vote_event(id: u64, voter: Address) -> OpsGovernor::Vote {
        OpsGovernor::Vote {
            id: U256::from(id),
            voter,
            direction: 0,
            votingPower: U256::from(1),
            reason: String::new(),
        }
    }

    #[test]
    fn test_split_windows() {
        assert_eq!(
            split_windows(100, 12050, 5000),
            vec![(100, 5100), (5100, 10100), (10100, 12050)]
        );
        assert_eq!(split_windows(100, 5100, 5000), vec![(100, 5100)]);
        assert_eq!(split_windows(7, 7, 5000), vec![(7, 7)]);
        assert!(split_windows(10, 9, 5000).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_issues_windows_in_order() {
        let ledger = Arc::new(MockLedger::new(20_000));
        let voter_a = Address::repeat_byte(0x0a);
        let voter_b = Address::repeat_byte(0x0b);
        ledger.push_log(event_log(governor(), &vote_event(7, voter_b), 9000, 0));
        ledger.push_log(event_log(governor(), &vote_event(7, voter_a), 200, 3));

        let aggregator = EventWindowAggregator::new(ledger.clone(), governor()).with_concurrency(3);
        let logs = aggregator
            .fetch_all(GovernorEvent::Vote, 7, 100, 12050)
            .await
            .unwrap();

        let mut ranges: Vec<_> = ledger
            .recorded_filters()
            .iter()
            .map(|f| (f.get_from_block().unwrap(), f.get_to_block().unwrap()))
            .collect();
        ranges.sort();
        assert_eq!(ranges, vec![(100, 5100), (5100, 10100), (10100, 12050)]);

        let blocks: Vec<_> = logs.iter().map(|l| l.block_number.unwrap()).collect();
        assert_eq!(blocks, vec![200, 9000]);
    }

    #[tokio::test]
    async fn test_boundary_logs_are_not_duplicated() {
        let ledger = Arc::new(MockLedger::new(20_000));
        ledger.push_log(event_log(
            governor(),
            &vote_event(7, Address::repeat_byte(0x0a)),
            5100,
            1,
        ));

        let aggregator = EventWindowAggregator::new(ledger.clone(), governor());
        let logs = aggregator
            .fetch_all(GovernorEvent::Vote, 7, 100, 12050)
            .await
            .unwrap();

        assert_eq!(logs.len(), 1);
    }

    #[tokio::test]
    async fn test_degenerate_range_issues_no_queries() {
        let ledger = Arc::new(MockLedger::new(100));
        let aggregator = EventWindowAggregator::new(ledger.clone(), governor());

        let logs = aggregator
            .fetch_all(GovernorEvent::Vote, 1, 50, 40)
            .await
            .unwrap();

        assert!(logs.is_empty());
        assert!(ledger.recorded_filters().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_all_filters_by_record() {
        let ledger = Arc::new(MockLedger::new(1000));
        ledger.push_log(event_log(governor(), &vote_event(7, Address::repeat_byte(1)), 10, 0));
        ledger.push_log(event_log(governor(), &vote_event(8, Address::repeat_byte(2)), 11, 0));

        let aggregator = EventWindowAggregator::new(ledger, governor());
        let logs = aggregator
            .fetch_all(GovernorEvent::Vote, 8, 0, 1000)
            .await
            .unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].block_number, Some(11));
    }

    #[tokio::test]
    async fn test_fetch_point_stops_at_first_match() {
        let ledger = Arc::new(MockLedger::new(30_000));
        let created = OpsGovernor::ProposalCreated {
            id: U256::from(3),
            proposer: Address::repeat_byte(0x0c),
            description: "raise limits".to_string(),
            deadline: U256::from(12_000),
        };
        ledger.push_log(event_log(governor(), &created, 6_000, 0));

        let aggregator = EventWindowAggregator::new(ledger.clone(), governor()).with_concurrency(1);
        let block = aggregator
            .fetch_point_block(GovernorEvent::ProposalCreated, 3, 0)
            .await
            .unwrap();

        assert_eq!(block, Some(6_000));
        // [0,5000] then [5000,10000]; later windows are never issued
        assert_eq!(ledger.recorded_filters().len(), 2);

        let missing = aggregator
            .fetch_point_block(GovernorEvent::ProposalExecuted, 3, 6_000)
            .await
            .unwrap();
        assert_eq!(missing, None);
    }
}
