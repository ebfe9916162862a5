use std::fmt;

use alloy::primitives::{Address, Bytes, U256};

/// Governance state of a proposal as stored on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProposalStatus {
    Pending,
    Rejected,
    ApprovedExecuted,
    ApprovedFailed,
}

impl ProposalStatus {
    pub fn code(self) -> u8 {
        match self {
            ProposalStatus::Pending => 0,
            ProposalStatus::Rejected => 1,
            ProposalStatus::ApprovedExecuted => 2,
            ProposalStatus::ApprovedFailed => 3,
        }
    }

    pub fn is_pending(self) -> bool {
        self == ProposalStatus::Pending
    }
}

impl TryFrom<u8> for ProposalStatus {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ProposalStatus::Pending),
            1 => Ok(ProposalStatus::Rejected),
            2 => Ok(ProposalStatus::ApprovedExecuted),
            3 => Ok(ProposalStatus::ApprovedFailed),
            other => Err(other),
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Rejected => "Rejected",
            ProposalStatus::ApprovedExecuted => "Approved and Executed",
            ProposalStatus::ApprovedFailed => "Approved but Failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteDirection {
    For,
    Against,
}

impl VoteDirection {
    pub fn code(self) -> u8 {
        match self {
            VoteDirection::For => 0,
            VoteDirection::Against => 1,
        }
    }
}

impl TryFrom<u8> for VoteDirection {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(VoteDirection::For),
            1 => Ok(VoteDirection::Against),
            other => Err(other),
        }
    }
}

impl std::str::FromStr for VoteDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "for" | "0" => Ok(VoteDirection::For),
            "against" | "1" => Ok(VoteDirection::Against),
            other => Err(format!("unknown vote direction '{}'", other)),
        }
    }
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteDirection::For => f.write_str("For"),
            VoteDirection::Against => f.write_str("Against"),
        }
    }
}

/// Where a log sits in the chain; orders events by emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogPosition {
    pub block_number: u64,
    pub log_index: u64,
}

impl LogPosition {
    /// Position for logs whose block is not yet known (pending).
    pub const UNKNOWN: LogPosition = LogPosition {
        block_number: u64::MAX,
        log_index: u64::MAX,
    };

    pub fn from_log(log: &alloy::rpc::types::Log) -> Self {
        match (log.block_number, log.log_index) {
            (Some(block_number), Some(log_index)) => Self {
                block_number,
                log_index,
            },
            (Some(block_number), None) => Self {
                block_number,
                log_index: u64::MAX,
            },
            _ => Self::UNKNOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposalRecord {
    pub id: u64,
    pub proposer: Address,
    pub description: String,
    pub call_data: Bytes,
    pub votes_for: U256,
    pub votes_against: U256,
    pub status: ProposalStatus,
    /// Block the proposal was created in.
    pub start_block: u64,
    /// Voting deadline.
    pub end_block: u64,
    /// Block of execution, 0 while unexecuted.
    pub executed_block: u64,
}

impl ProposalRecord {
    pub fn is_executed(&self) -> bool {
        self.executed_block != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    pub proposal_id: u64,
    pub voter: Address,
    pub direction: VoteDirection,
    pub voting_power: U256,
    pub reason: String,
    pub position: LogPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for code in 0u8..4 {
            let status = ProposalStatus::try_from(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(ProposalStatus::try_from(4), Err(4));
        assert!(ProposalStatus::Pending.is_pending());
    }

    #[test]
    fn test_vote_direction_parsing() {
        assert_eq!("for".parse::<VoteDirection>().unwrap(), VoteDirection::For);
        assert_eq!("AGAINST".parse::<VoteDirection>().unwrap(), VoteDirection::Against);
        assert!("abstain".parse::<VoteDirection>().is_err());
        assert_eq!(VoteDirection::try_from(1).unwrap(), VoteDirection::Against);
    }

    #[test]
    fn test_pending_logs_sort_last() {
        let mined = LogPosition {
            block_number: 10,
            log_index: 2,
        };
        assert!(mined < LogPosition::UNKNOWN);

        let log = alloy::rpc::types::Log::default();
        assert_eq!(LogPosition::from_log(&log), LogPosition::UNKNOWN);
    }
}
