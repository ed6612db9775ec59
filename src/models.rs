//! Core auction entities shared across the gateway.

use serde::{Deserialize, Serialize};

/// The all-zero address the contract uses for "no bidder yet".
pub const SENTINEL_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Contract-declared lifecycle stage of an auction.
///
/// Distinct from the clock-derived active/finished predicate: the contract
/// only flips this field when someone lands a completing transaction, so an
/// auction can sit past its deadline while still declared `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    Active,
    Completed,
    Withdraw,
    /// Fallback for status codes this gateway does not know about.
    Unknown,
}

impl AuctionStatus {
    /// Maps the on-chain status code. Unrecognized codes fall back to
    /// `Unknown` instead of failing the whole record.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AuctionStatus::Active,
            1 => AuctionStatus::Completed,
            2 => AuctionStatus::Withdraw,
            _ => AuctionStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Active => "Active",
            AuctionStatus::Completed => "Completed",
            AuctionStatus::Withdraw => "Withdraw",
            AuctionStatus::Unknown => "Unknown",
        }
    }
}

/// One auction as read from the contract, normalized for display.
///
/// Immutable snapshot: entities are built only by the normalizer from a fresh
/// `getAuctions()` read and replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub auction_id: u64,
    pub creator: String,
    pub description: String,
    /// Unix timestamp in seconds after which bidding closes.
    pub deadline: i64,
    /// Sentinel all-zero address means no bids yet.
    pub highest_bidder: String,
    /// Whole-coin decimal string, already converted from wei.
    pub highest_bid: String,
    pub status: AuctionStatus,
}

impl Auction {
    /// Whether anyone has bid yet, going by the bidder field. The contract
    /// keeps bid amount and bidder consistent; the gateway only displays.
    pub fn has_bid(&self) -> bool {
        self.highest_bidder != SENTINEL_ADDRESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_declared_stages() {
        assert_eq!(AuctionStatus::from_code(0), AuctionStatus::Active);
        assert_eq!(AuctionStatus::from_code(1), AuctionStatus::Completed);
        assert_eq!(AuctionStatus::from_code(2), AuctionStatus::Withdraw);
    }

    #[test]
    fn unrecognized_status_code_falls_back_to_unknown() {
        assert_eq!(AuctionStatus::from_code(3), AuctionStatus::Unknown);
        assert_eq!(AuctionStatus::from_code(255), AuctionStatus::Unknown);
    }

    #[test]
    fn sentinel_bidder_means_no_bid() {
        let auction = Auction {
            auction_id: 1,
            creator: "0x49a9e72975ea74133abf1e0c2780689d368c7781".to_string(),
            description: "Iphone".to_string(),
            deadline: 1_700_000_000,
            highest_bidder: SENTINEL_ADDRESS.to_string(),
            highest_bid: "0.0".to_string(),
            status: AuctionStatus::Active,
        };
        assert!(!auction.has_bid());
    }
}
