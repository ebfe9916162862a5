//! OpsGovernor contract bindings.

use alloy::primitives::U256;
use alloy::sol;

use super::error::GovernorError;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    contract OpsGovernor {
        struct Proposal {
            address proposer;
            string description;
            bytes callData;
            uint256 votesFor;
            uint256 votesAgainst;
            uint8 status;
            uint256 deadline;
        }

        function getNumProposals() external view returns (uint256);
        function getProposal(uint256 id) external view returns (Proposal memory);
        function getActiveProposalsIds() external view returns (uint256[] memory);
        function getIsProposalExecutable(uint256 id) external view returns (bool);
        function getManagers() external view returns (address[] memory);
        function getOperators() external view returns (address[] memory);

        function getNumRegisteredTokens() external view returns (uint256);
        function getNumRegisteredProtocols() external view returns (uint256);
        function getNumRegisteredUtils() external view returns (uint256);
        function getRegisteredTokens(uint256 start, uint256 end) external view returns (address[] memory);
        function getRegisteredProtocols(uint256 start, uint256 end) external view returns (address[] memory);
        function getRegisteredUtils(uint256 start, uint256 end) external view returns (address[] memory);

        function createProposal(string description, uint256 blocksDuration, bytes callData) external returns (uint256);
        function vote(uint256 id, uint8 direction) external;
        function executeProposal(uint256 id) external;

        event ProposalCreated(uint256 indexed id, address indexed proposer, string description, uint256 deadline);
        event Vote(uint256 indexed id, address voter, uint8 direction, uint256 votingPower, string reason);
        event ProposalExecuted(uint256 indexed id, uint8 status);
    }
}

/// Narrow an on-chain uint256 that must fit a block number or id.
pub fn to_u64(value: U256, field: &str) -> Result<u64, GovernorError> {
    u64::try_from(value)
        .map_err(|_| GovernorError::InvalidRecord(format!("{} {} exceeds u64", field, value)))
}
