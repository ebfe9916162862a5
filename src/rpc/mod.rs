mod ledger;
mod rpc;

pub use ledger::{LedgerClient, LogSubscription, SubmittedTransaction};
pub use rpc::{
    with_retry, RateLimitConfig, RetryConfig, RpcClient, RpcClientConfig, RpcError,
    USER_REJECTED_CODE,
};
