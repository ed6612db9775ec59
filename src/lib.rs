//! Auction Gateway Library
//!
//! Off-chain gateway for the AuctionSystem contract: decodes `getAuctions()`
//! at the JSON-RPC boundary, keeps the latest normalized snapshot in memory,
//! and serves filtered listing views, countdowns and transaction submission
//! over HTTP/WS. The contract itself owns all auction rules and custody.

pub mod abi;
pub mod api;
pub mod contract;
pub mod countdown;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod service;
pub mod store;
pub mod units;
