//! Client for an OpsGovernor governance contract.
//!
//! - [`abi`]: function registry, editable argument trees and the call codec
//! - [`governor`]: proposal pagination, windowed event aggregation, live views
//! - [`rpc`]: the ledger client and its HTTP implementation
//! - [`types`]: records and configuration

pub mod abi;
pub mod governor;
pub mod rpc;
pub mod types;
