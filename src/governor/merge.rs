//! Keyed collection shared by historical fetches and live feeds.
//!
//! Merging is commutative and idempotent over each item's identity key, so
//! the same event delivered by both a window query and a subscription is
//! stored once no matter which arrives first.

use std::collections::HashMap;
use std::hash::Hash;

use alloy::primitives::Address;

use crate::types::proposal::{LogPosition, ProposalRecord, VoteRecord};

pub trait Keyed {
    type Key: Eq + Hash + Clone;
    type Order: Ord;

    fn key(&self) -> Self::Key;

    /// Sort key for presentation.
    fn order(&self) -> Self::Order;

    /// Whether `self` replaces an `existing` item with the same key.
    fn supersedes(&self, existing: &Self) -> bool;
}

impl Keyed for VoteRecord {
    type Key = (u64, Address);
    type Order = (LogPosition, Address);

    fn key(&self) -> Self::Key {
        (self.proposal_id, self.voter)
    }

    fn order(&self) -> Self::Order {
        (self.position, self.voter)
    }

    /// The earliest delivery of a vote is canonical.
    fn supersedes(&self, existing: &Self) -> bool {
        self.position < existing.position
    }
}

impl Keyed for ProposalRecord {
    type Key = u64;
    type Order = std::cmp::Reverse<u64>;

    fn key(&self) -> Self::Key {
        self.id
    }

    /// Newest first.
    fn order(&self) -> Self::Order {
        std::cmp::Reverse(self.id)
    }

    fn supersedes(&self, _existing: &Self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct MergeSet<T: Keyed> {
    items: HashMap<T::Key, T>,
}

impl<T: Keyed> Default for MergeSet<T> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<T: Keyed> MergeSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one item. Returns true if its key was not present before.
    pub fn merge(&mut self, item: T) -> bool {
        match self.items.get_mut(&item.key()) {
            Some(existing) => {
                if item.supersedes(existing) {
                    *existing = item;
                }
                false
            }
            None => {
                self.items.insert(item.key(), item);
                true
            }
        }
    }

    /// Merge many items, returning how many keys were new.
    pub fn merge_all(&mut self, items: impl IntoIterator<Item = T>) -> usize {
        let mut added = 0;
        for item in items {
            if self.merge(item) {
                added += 1;
            }
        }
        added
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.items.contains_key(key)
    }

    pub fn get(&self, key: &T::Key) -> Option<&T> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in presentation order.
    pub fn sorted(&self) -> Vec<&T> {
        let mut items: Vec<&T> = self.items.values().collect();
        items.sort_by_key(|item| item.order());
        items
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::proposal::VoteDirection;
    use alloy::primitives::U256;

    fn vote(proposal_id: u64, voter: Address, block_number: u64) -> VoteRecord {
        VoteRecord {
            proposal_id,
            voter,
            direction: VoteDirection::For,
            voting_power: U256::from(1),
            reason: String::new(),
            position: LogPosition {
                block_number,
                log_index: 0,
            },
        }
    }

    #[test]
    fn test_redelivered_vote_is_stored_once() {
        let voter = Address::repeat_byte(0xab);
        let mut votes = MergeSet::new();

        assert!(votes.merge(vote(7, voter, 120)));
        assert!(!votes.merge(vote(7, voter, 120)));
        assert_eq!(votes.len(), 1);

        // Same voter on another proposal is a different identity
        assert!(votes.merge(vote(8, voter, 121)));
        assert_eq!(votes.len(), 2);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let deliveries = vec![vote(7, a, 10), vote(7, b, 12), vote(7, a, 30)];

        let mut forward = MergeSet::new();
        forward.merge_all(deliveries.clone());
        let mut backward = MergeSet::new();
        backward.merge_all(deliveries.into_iter().rev());

        let f: Vec<_> = forward.sorted().into_iter().cloned().collect();
        let r: Vec<_> = backward.sorted().into_iter().cloned().collect();
        assert_eq!(f, r);
        assert_eq!(f[0].position.block_number, 10);
        assert_eq!(f[1].voter, b);
    }
}
