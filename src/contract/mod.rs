//! External AuctionSystem contract collaborator.
//!
//! The contract owns the auction rules, escrow and payouts; this module only
//! speaks its fixed call surface. [`AuctionContract`] is the seam the rest of
//! the gateway depends on, [`eth_rpc`] is the JSON-RPC implementation.

pub mod eth_rpc;

use anyhow::Result;
use async_trait::async_trait;
use num_bigint::BigUint;
use serde::Serialize;
use thiserror::Error;

use crate::abi::AbiValue;

pub use eth_rpc::{detect_provider, AuctionSystemClient, EthRpcClient, ProviderInfo, TxHandle};

/// 4-byte keccak selectors of the AuctionSystem entry points.
pub mod selectors {
    /// getAuctions()
    pub const GET_AUCTIONS: [u8; 4] = [0xd7, 0xc0, 0x69, 0x19];
    /// createAuction(string,uint256)
    pub const CREATE_AUCTION: [u8; 4] = [0xff, 0x89, 0x52, 0x39];
    /// bid(uint256)
    pub const BID: [u8; 4] = [0x45, 0x4a, 0x2a, 0xb3];
    /// refund(uint256)
    pub const REFUND: [u8; 4] = [0x27, 0x8e, 0xcd, 0xe1];
    /// getWinner(uint256)
    pub const GET_WINNER: [u8; 4] = [0x41, 0x29, 0xb2, 0xc9];
    /// receipt(uint256)
    pub const RECEIPT: [u8; 4] = [0xa2, 0xaa, 0x43, 0x37];
    /// auctionWithdraw(uint256)
    pub const AUCTION_WITHDRAW: [u8; 4] = [0x67, 0x18, 0xaf, 0xb3];
}

/// How an awaited transaction can end short of confirmation. Revert reasons
/// come from the contract and pass through verbatim, uninterpreted.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("transaction reverted: {0}")]
    Reverted(String),
    #[error("transaction failed: {0}")]
    Failed(String),
}

/// A mined, successful transaction.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedTx {
    pub tx_hash: String,
    pub block_number: u64,
}

/// The fixed call surface of the deployed AuctionSystem contract.
///
/// Read calls return raw decoded records; shaping them into entities is the
/// normalizer's job. Write calls return a [`TxHandle`] whose `confirmed()`
/// resolves once the transaction mines or surfaces the revert reason.
#[async_trait]
pub trait AuctionContract: Send + Sync {
    async fn get_auctions(&self) -> Result<Vec<Vec<AbiValue>>>;

    async fn create_auction(
        &self,
        description: &str,
        time_to_live_minutes: u64,
    ) -> Result<TxHandle>;

    /// Places a bid; `value_wei` rides along as the transaction value.
    async fn bid(&self, auction_id: u64, value_wei: BigUint) -> Result<TxHandle>;

    /// Reclaims an outbid deposit.
    async fn refund(&self, auction_id: u64) -> Result<TxHandle>;

    async fn get_winner(&self, auction_id: u64) -> Result<String>;

    /// Buyer confirms delivery.
    async fn receipt(&self, auction_id: u64) -> Result<TxHandle>;

    /// Creator claims the proceeds.
    async fn auction_withdraw(&self, auction_id: u64) -> Result<TxHandle>;
}
