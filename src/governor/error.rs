use thiserror::Error;

use crate::abi::AbiError;
use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("No OpsGovernor deployment on chain {chain_id}")]
    UnsupportedNetwork { chain_id: u64 },

    #[error("Connect to a network first")]
    ConnectRequired,

    #[error("User rejected the request")]
    UserRejected,

    #[error("Ledger request failed: {0}")]
    Transport(RpcError),

    #[error("Failed to decode {0}")]
    Decode(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Validation(#[from] AbiError),
}

impl GovernorError {
    /// A declined wallet prompt; callers treat it as a normal choice.
    pub fn is_user_rejected(&self) -> bool {
        matches!(self, GovernorError::UserRejected)
    }

    /// Capability errors are shown as a state, not as a failure.
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(
            self,
            GovernorError::UnsupportedNetwork { .. } | GovernorError::ConnectRequired
        )
    }
}

impl From<RpcError> for GovernorError {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::UserRejected => GovernorError::UserRejected,
            other => GovernorError::Transport(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_maps_to_user_rejected() {
        let err = GovernorError::from(RpcError::UserRejected);
        assert!(err.is_user_rejected());

        let err = GovernorError::from(RpcError::Transport("connection reset".into()));
        assert!(matches!(err, GovernorError::Transport(_)));
        assert!(!err.is_user_rejected());
    }
}
