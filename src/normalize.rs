//! Turns raw `getAuctions()` records into typed [`Auction`] entities.
//!
//! The contract hands back positional 7-field tuples. Everything positional
//! stops here: numeric fields get checked conversions, the bid gets its
//! fixed 18-decimal scaling, and the status code maps through the enum. A
//! record that does not fit the expected shape fails the whole refresh; the
//! gateway never fabricates or drops entries.

use num_bigint::BigUint;
use thiserror::Error;

use crate::abi::{AbiValue, AUCTION_FIELDS};
use crate::models::{Auction, AuctionStatus};
use crate::units::format_ether;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// A numeric field that must fit a native integer did not. Auction ids
    /// and deadlines are never expected to, but the conversion is checked
    /// rather than silently truncating.
    #[error("auction record field {field} value {value} exceeds the native integer range")]
    PrecisionLoss { field: &'static str, value: String },
    #[error("malformed auction record: {0}")]
    MalformedRecord(String),
}

fn field_uint<'a>(
    record: &'a [AbiValue],
    index: usize,
    field: &'static str,
) -> Result<&'a BigUint, NormalizeError> {
    match record.get(index) {
        Some(AbiValue::Uint(v)) => Ok(v),
        Some(other) => Err(NormalizeError::MalformedRecord(format!(
            "field {field} at position {index} is not a uint: {other:?}"
        ))),
        None => Err(NormalizeError::MalformedRecord(format!(
            "field {field} missing at position {index}"
        ))),
    }
}

fn field_address(
    record: &[AbiValue],
    index: usize,
    field: &'static str,
) -> Result<String, NormalizeError> {
    match record.get(index) {
        Some(AbiValue::Address(a)) => Ok(a.clone()),
        Some(other) => Err(NormalizeError::MalformedRecord(format!(
            "field {field} at position {index} is not an address: {other:?}"
        ))),
        None => Err(NormalizeError::MalformedRecord(format!(
            "field {field} missing at position {index}"
        ))),
    }
}

fn field_string(
    record: &[AbiValue],
    index: usize,
    field: &'static str,
) -> Result<String, NormalizeError> {
    match record.get(index) {
        Some(AbiValue::Str(s)) => Ok(s.clone()),
        Some(other) => Err(NormalizeError::MalformedRecord(format!(
            "field {field} at position {index} is not a string: {other:?}"
        ))),
        None => Err(NormalizeError::MalformedRecord(format!(
            "field {field} missing at position {index}"
        ))),
    }
}

/// Normalizes one raw record into an [`Auction`].
///
/// No validation beyond shape: the entity is a display projection, so e.g.
/// description length is not re-checked on read.
pub fn normalize(record: &[AbiValue]) -> Result<Auction, NormalizeError> {
    if record.len() != AUCTION_FIELDS {
        return Err(NormalizeError::MalformedRecord(format!(
            "expected {AUCTION_FIELDS} fields, got {}",
            record.len()
        )));
    }

    let id = field_uint(record, 0, "auctionId")?;
    let auction_id = u64::try_from(id).map_err(|_| NormalizeError::PrecisionLoss {
        field: "auctionId",
        value: id.to_string(),
    })?;

    let deadline_raw = field_uint(record, 3, "deadline")?;
    let deadline = i64::try_from(deadline_raw).map_err(|_| NormalizeError::PrecisionLoss {
        field: "deadline",
        value: deadline_raw.to_string(),
    })?;

    let status_code = field_uint(record, 6, "status")?;
    let status = match u8::try_from(status_code) {
        Ok(code) => AuctionStatus::from_code(code),
        // A status wider than u8 is still just a code we do not know.
        Err(_) => AuctionStatus::Unknown,
    };

    Ok(Auction {
        auction_id,
        creator: field_address(record, 1, "creator")?,
        description: field_string(record, 2, "description")?,
        deadline,
        highest_bidder: field_address(record, 4, "highestBidder")?,
        highest_bid: format_ether(field_uint(record, 5, "highestBid")?),
        status,
    })
}

/// Normalizes a whole refresh. All-or-nothing: the first bad record aborts so
/// a partially-normalized collection is never exposed.
pub fn normalize_all(records: &[Vec<AbiValue>]) -> Result<Vec<Auction>, NormalizeError> {
    records.iter().map(|r| normalize(r)).collect()
}
