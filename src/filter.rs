//! Listing filters: derive the subset of auctions matching a view selector,
//! plus the per-category counts shown as UI badges.
//!
//! Two deliberately separate selector families: `all`/`active`/`finished` are
//! clock predicates evaluated against a supplied `now`, while `Completed` and
//! `Withdraw` match the contract-declared status exactly — an auction can be
//! past its deadline and still not `Completed` until someone lands the
//! completing transaction.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::countdown::is_active;
use crate::models::{Auction, AuctionStatus};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized auction filter: {0:?}")]
pub struct UnrecognizedFilterError(pub String);

/// A requested listing view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Active,
    Finished,
    Completed,
    Withdraw,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Finished => "finished",
            StatusFilter::Completed => "Completed",
            StatusFilter::Withdraw => "Withdraw",
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnrecognizedFilterError;

    /// Only the exact selector keys are accepted; anything else is caller
    /// misuse, never a silent fallback to `all`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "finished" => Ok(StatusFilter::Finished),
            "Completed" => Ok(StatusFilter::Completed),
            "Withdraw" => Ok(StatusFilter::Withdraw),
            other => Err(UnrecognizedFilterError(other.to_string())),
        }
    }
}

fn matches(auction: &Auction, selector: StatusFilter, now: i64) -> bool {
    match selector {
        StatusFilter::All => true,
        StatusFilter::Active => is_active(auction.deadline, now),
        StatusFilter::Finished => !is_active(auction.deadline, now),
        StatusFilter::Completed => auction.status == AuctionStatus::Completed,
        StatusFilter::Withdraw => auction.status == AuctionStatus::Withdraw,
    }
}

/// The auctions matching `selector` as of `now`, input order preserved.
pub fn filter(auctions: &[Auction], selector: StatusFilter, now: i64) -> Vec<Auction> {
    auctions
        .iter()
        .filter(|a| matches(a, selector, now))
        .cloned()
        .collect()
}

/// Parses the selector key first, so a bogus key errors instead of listing
/// everything.
pub fn filter_by_key(
    auctions: &[Auction],
    key: &str,
    now: i64,
) -> Result<Vec<Auction>, UnrecognizedFilterError> {
    Ok(filter(auctions, key.parse()?, now))
}

/// Per-category sizes for one snapshot at one instant. Computed in a single
/// pass so badge counts always agree with the filtered view next to them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub all: usize,
    pub active: usize,
    pub finished: usize,
    pub completed: usize,
    pub withdraw: usize,
}

pub fn counts(auctions: &[Auction], now: i64) -> FilterCounts {
    let mut out = FilterCounts::default();
    for auction in auctions {
        out.all += 1;
        if is_active(auction.deadline, now) {
            out.active += 1;
        } else {
            out.finished += 1;
        }
        match auction.status {
            AuctionStatus::Completed => out.completed += 1,
            AuctionStatus::Withdraw => out.withdraw += 1,
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SENTINEL_ADDRESS;

    const NOW: i64 = 1_700_000_000;

    fn auction(id: u64, deadline: i64, status: AuctionStatus) -> Auction {
        Auction {
            auction_id: id,
            creator: "0x49a9e72975ea74133abf1e0c2780689d368c7781".to_string(),
            description: format!("item {id}"),
            deadline,
            highest_bidder: SENTINEL_ADDRESS.to_string(),
            highest_bid: "0.0".to_string(),
            status,
        }
    }

    fn snapshot() -> Vec<Auction> {
        vec![
            auction(1, NOW + 60, AuctionStatus::Active),
            auction(2, NOW - 60, AuctionStatus::Active), // past deadline, not yet completed
            auction(3, NOW - 120, AuctionStatus::Completed),
            auction(4, NOW - 180, AuctionStatus::Withdraw),
            auction(5, NOW + 3_600, AuctionStatus::Unknown),
        ]
    }

    fn ids(auctions: &[Auction]) -> Vec<u64> {
        auctions.iter().map(|a| a.auction_id).collect()
    }

    #[test]
    fn all_preserves_order() {
        assert_eq!(ids(&filter(&snapshot(), StatusFilter::All, NOW)), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn active_and_finished_split_on_the_clock() {
        assert_eq!(ids(&filter(&snapshot(), StatusFilter::Active, NOW)), vec![1, 5]);
        assert_eq!(ids(&filter(&snapshot(), StatusFilter::Finished, NOW)), vec![2, 3, 4]);
    }

    #[test]
    fn declared_status_filters_ignore_the_clock() {
        assert_eq!(ids(&filter(&snapshot(), StatusFilter::Completed, NOW)), vec![3]);
        assert_eq!(ids(&filter(&snapshot(), StatusFilter::Withdraw, NOW)), vec![4]);
    }

    #[test]
    fn bogus_selector_is_an_error_not_all() {
        let err = filter_by_key(&snapshot(), "bogus", NOW).unwrap_err();
        assert_eq!(err, UnrecognizedFilterError("bogus".to_string()));
        // selector keys are case-exact
        assert!(filter_by_key(&snapshot(), "completed", NOW).is_err());
        assert!(filter_by_key(&snapshot(), "Active", NOW).is_err());
    }

    #[test]
    fn counts_partition_active_plus_finished_equals_all() {
        let snapshot = snapshot();
        for now in [NOW - 1_000, NOW, NOW + 1_000, NOW + 100_000] {
            let c = counts(&snapshot, now);
            assert_eq!(c.active + c.finished, c.all);
        }
    }

    #[test]
    fn counts_agree_with_the_filtered_views() {
        let snapshot = snapshot();
        let c = counts(&snapshot, NOW);
        assert_eq!(c.all, 5);
        assert_eq!(c.active, filter(&snapshot, StatusFilter::Active, NOW).len());
        assert_eq!(c.finished, filter(&snapshot, StatusFilter::Finished, NOW).len());
        assert_eq!(c.completed, 1);
        assert_eq!(c.withdraw, 1);
    }

    #[test]
    fn empty_snapshot_counts_are_zero() {
        assert_eq!(counts(&[], NOW), FilterCounts::default());
    }
}
