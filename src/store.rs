//! In-memory snapshot of the latest contract read.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::Auction;

/// Holds the most recent full set of auctions.
///
/// There is exactly one mutation, `replace_all`, which swaps the whole
/// snapshot under a short write lock; readers either see the old set or the
/// new one, never a mix. Clones share the same backing snapshot.
#[derive(Clone, Default)]
pub struct AuctionStore {
    inner: Arc<RwLock<Vec<Auction>>>,
}

impl AuctionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a fresh snapshot wholesale. No merging with prior contents.
    pub fn replace_all(&self, auctions: Vec<Auction>) {
        *self.inner.write() = auctions;
    }

    /// Every auction, in the order the contract returned them.
    pub fn all(&self) -> Vec<Auction> {
        self.inner.read().clone()
    }

    /// Lookup by id. Not finding one is a normal outcome, not an error.
    pub fn by_id(&self, auction_id: u64) -> Option<Auction> {
        self.inner
            .read()
            .iter()
            .find(|a| a.auction_id == auction_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuctionStatus, SENTINEL_ADDRESS};

    fn auction(id: u64) -> Auction {
        Auction {
            auction_id: id,
            creator: "0x49a9e72975ea74133abf1e0c2780689d368c7781".to_string(),
            description: format!("item {id}"),
            deadline: 1_700_000_000 + id as i64,
            highest_bidder: SENTINEL_ADDRESS.to_string(),
            highest_bid: "0.0".to_string(),
            status: AuctionStatus::Active,
        }
    }

    #[test]
    fn replace_all_returns_exactly_what_went_in_same_order() {
        let store = AuctionStore::new();
        store.replace_all(vec![auction(3), auction(1), auction(2)]);

        let ids: Vec<u64> = store.all().iter().map(|a| a.auction_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn replace_all_discards_prior_contents() {
        let store = AuctionStore::new();
        store.replace_all(vec![auction(1), auction(2)]);
        store.replace_all(vec![auction(9)]);

        assert_eq!(store.len(), 1);
        assert!(store.by_id(1).is_none());
        assert_eq!(store.by_id(9).unwrap().auction_id, 9);
    }

    #[test]
    fn by_id_miss_is_none() {
        let store = AuctionStore::new();
        assert!(store.is_empty());
        assert!(store.by_id(42).is_none());
    }

    #[test]
    fn clones_share_the_snapshot() {
        let store = AuctionStore::new();
        let view = store.clone();
        store.replace_all(vec![auction(1)]);
        assert_eq!(view.len(), 1);
    }
}
