//! Aggregation of OpsGovernor state from calls and event logs.
//!
//! Reads go through a [`GovernorReader`] bound to one [`QueryPlan`].
//! Historical logs are fetched in bounded block windows by the
//! [`EventWindowAggregator`]; views merge them with live subscriptions
//! through a keyed [`MergeSet`], so redelivered events are stored once.

pub mod actions;
pub mod active;
pub mod contract;
pub mod error;
pub mod events;
pub mod merge;
pub mod overview;
pub mod paginator;
pub mod plan;
pub mod proposal;
pub mod reader;
pub mod scope;

#[cfg(test)]
pub(crate) mod mock;

pub use actions::{GovernorActions, SubmitOutcome};
pub use active::ActiveProposals;
pub use contract::OpsGovernor;
pub use error::GovernorError;
pub use events::{split_windows, EventWindowAggregator, GovernorEvent};
pub use merge::{Keyed, MergeSet};
pub use overview::{load_overview, GovernorOverview, Registry};
pub use paginator::{PaginationCursor, ProposalPaginator};
pub use plan::QueryPlan;
pub use proposal::{ProposalView, ViewUpdate};
pub use reader::{GovernorReader, ProposalSource};
pub use scope::ViewScope;
