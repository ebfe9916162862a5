use alloy::network::ReceiptResponse;
use alloy::primitives::{Address, BlockNumber, Bytes, TxHash};
use alloy::rpc::types::{Filter, Log, TransactionReceipt};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::rpc::{RpcClient, RpcError};

/// Everything the governor client needs from a chain connection.
#[async_trait]
pub trait LedgerClient: Send + Sync + 'static {
    async fn get_block_number(&self) -> Result<BlockNumber, RpcError>;

    /// Chain id reported by the endpoint.
    async fn get_chain_id(&self) -> Result<u64, RpcError>;

    /// Read-only contract call against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError>;

    async fn subscribe_logs(&self, filter: Filter) -> Result<LogSubscription, RpcError>;

    /// Submit a state-changing call from `from` and wait for its receipt.
    async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<SubmittedTransaction, RpcError>;
}

/// Mined transaction as reported by its receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub hash: TxHash,
    pub block_number: Option<BlockNumber>,
    pub success: bool,
}

impl From<TransactionReceipt> for SubmittedTransaction {
    fn from(receipt: TransactionReceipt) -> Self {
        Self {
            hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            success: receipt.status(),
        }
    }
}

/// Stream of logs delivered by a live subscription.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct LogSubscription {
    rx: mpsc::Receiver<Log>,
    poller: Option<JoinHandle<()>>,
}

impl LogSubscription {
    pub fn new(rx: mpsc::Receiver<Log>, poller: Option<JoinHandle<()>>) -> Self {
        Self { rx, poller }
    }

    /// Subscription fed directly by a channel, with no background task.
    pub fn from_channel(rx: mpsc::Receiver<Log>) -> Self {
        Self::new(rx, None)
    }

    /// Next log, or `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<Log> {
        self.rx.recv().await
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

#[async_trait]
impl LedgerClient for RpcClient {
    async fn get_block_number(&self) -> Result<BlockNumber, RpcError> {
        RpcClient::get_block_number(self).await
    }

    async fn get_chain_id(&self) -> Result<u64, RpcError> {
        RpcClient::get_chain_id(self).await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        RpcClient::call(self, &RpcClient::call_request(to, data), None).await
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, RpcError> {
        RpcClient::get_logs(self, filter).await
    }

    async fn subscribe_logs(&self, filter: Filter) -> Result<LogSubscription, RpcError> {
        RpcClient::subscribe_logs(self, filter).await
    }

    async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
    ) -> Result<SubmittedTransaction, RpcError> {
        use alloy::network::TransactionBuilder;

        let tx = RpcClient::call_request(to, data).with_from(from);
        RpcClient::send_transaction(self, tx)
            .await
            .map(SubmittedTransaction::from)
    }
}
