//! In-memory ledger for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use alloy::hex;
use alloy::primitives::{keccak256, Address, BlockNumber, Bytes, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::contract::OpsGovernor;
use super::plan::QueryPlan;
use crate::rpc::{LedgerClient, LogSubscription, RpcError, SubmittedTransaction};

pub struct MockLedger {
    head: AtomicU64,
    logs: Mutex<Vec<Log>>,
    calls: Mutex<HashMap<Bytes, Bytes>>,
    filters: Mutex<Vec<Filter>>,
    live: Mutex<Vec<(Filter, mpsc::Sender<Log>)>>,
    sent: Mutex<Vec<(Address, Address, Bytes)>>,
    reject: AtomicBool,
}

impl MockLedger {
    pub fn new(head: u64) -> Self {
        Self {
            head: AtomicU64::new(head),
            logs: Mutex::new(Vec::new()),
            calls: Mutex::new(HashMap::new()),
            filters: Mutex::new(Vec::new()),
            live: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    pub fn plan(&self) -> QueryPlan {
        QueryPlan {
            chain_id: 31337,
            governor: Address::repeat_byte(0x60),
            deployment_block: 0,
        }
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    /// Make a log visible to historical queries.
    pub fn push_log(&self, log: Log) {
        self.logs.lock().unwrap().push(log);
    }

    /// Deliver a log to matching live subscriptions.
    pub fn emit(&self, log: Log) {
        for (filter, tx) in self.live.lock().unwrap().iter() {
            if matches(filter, &log) {
                let _ = tx.try_send(log.clone());
            }
        }
    }

    pub fn stub_call<T: SolCall, R: SolValue>(&self, call: T, ret: R) {
        self.calls
            .lock()
            .unwrap()
            .insert(call.abi_encode().into(), ret.abi_encode().into());
    }

    pub fn stub_proposal(&self, id: u64, proposal: OpsGovernor::Proposal) {
        self.stub_call(OpsGovernor::getProposalCall { id: U256::from(id) }, proposal);
    }

    pub fn reject_transactions(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn recorded_filters(&self) -> Vec<Filter> {
        self.filters.lock().unwrap().clone()
    }

    pub fn sent_transactions(&self) -> Vec<(Address, Address, Bytes)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn live_subscribers(&self) -> usize {
        self.live
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub async fn wait_for_unsubscribed(&self) {
        let senders: Vec<mpsc::Sender<Log>> = self
            .live
            .lock()
            .unwrap()
            .iter()
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            tx.closed().await;
        }
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
        Ok(self.head.load(Ordering::SeqCst))
    }

    async fn get_chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.plan().chain_id)
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .get(&data)
            .cloned()
            .ok_or_else(|| RpcError::Unsupported(format!("no stub for call {}", hex::encode_prefixed(&data))))
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        self.filters.lock().unwrap().push(filter.clone());
        let mut logs: Vec<Log> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| matches(filter, log))
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(logs)
    }

    async fn subscribe_logs(&self, filter: Filter) -> Result<LogSubscription, RpcError> {
        let (tx, rx) = mpsc::channel(64);
        self.live.lock().unwrap().push((filter, tx));
        Ok(LogSubscription::from_channel(rx))
    }

    async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<SubmittedTransaction, RpcError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(RpcError::UserRejected);
        }
        let hash = keccak256(&data);
        self.sent.lock().unwrap().push((from, to, data));
        Ok(SubmittedTransaction {
            hash,
            block_number: Some(self.head.load(Ordering::SeqCst)),
            success: true,
        })
    }
}

fn matches(filter: &Filter, log: &Log) -> bool {
    let block = log.block_number.unwrap_or_default();
    if filter.get_from_block().is_some_and(|from| block < from)
        || filter.get_to_block().is_some_and(|to| block > to)
    {
        return false;
    }
    if !filter.address.matches(&log.address()) {
        return false;
    }
    let topics = log.topics();
    filter
        .topics
        .iter()
        .enumerate()
        .all(|(i, set)| set.is_empty() || topics.get(i).is_some_and(|t| set.matches(t)))
}

/// Mined log for `event` emitted by `address`.
pub fn event_log<E: SolEvent>(address: Address, event: &E, block_number: u64, log_index: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address,
            data: event.encode_log_data(),
        },
        block_number: Some(block_number),
        log_index: Some(log_index),
        ..Default::default()
    }
}

pub fn proposal_fixture(status: u8, deadline: u64) -> OpsGovernor::Proposal {
    OpsGovernor::Proposal {
        proposer: Address::repeat_byte(0x99),
        description: "adjust fees".to_string(),
        callData: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
        votesFor: U256::from(2),
        votesAgainst: U256::from(1),
        status,
        deadline: U256::from(deadline),
    }
}
