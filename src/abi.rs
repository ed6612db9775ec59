//! Minimal ABI codec for the AuctionSystem contract.
//!
//! Only the shapes this gateway actually exchanges are implemented: 32-byte
//! words holding uint256/address values, dynamic strings, the dynamic array
//! of 7-field auction structs returned by `getAuctions()`, and the
//! `Error(string)` revert payload. Everything is bounds-checked; a response
//! that does not fit the expected layout is an error, never a partial decode.

use num_bigint::BigUint;
use thiserror::Error;

/// Size of one ABI word.
pub const WORD: usize = 32;

/// Field count of the auction struct: (id, creator, description, deadline,
/// highestBidder, highestBid, status).
pub const AUCTION_FIELDS: usize = 7;

/// `Error(string)` selector, prefixed to revert reason payloads.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbiError {
    #[error("response truncated: need {needed} bytes at offset {offset}, have {have}")]
    Truncated {
        offset: usize,
        needed: usize,
        have: usize,
    },
    #[error("offset or length word does not fit in usize")]
    OffsetOverflow,
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
    #[error("uint argument does not fit in one word")]
    UintTooWide,
    #[error("address literal {0:?} is not 20 bytes of hex")]
    BadAddress(String),
}

/// One decoded ABI value. Records decoded at the boundary carry these so the
/// rest of the gateway never indexes raw words again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(BigUint),
    Address(String),
    Str(String),
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    // Offsets come straight off the wire; the addition itself must not trap.
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or(AbiError::Truncated {
            offset,
            needed: WORD,
            have: data.len(),
        })
}

fn uint_at(data: &[u8], offset: usize) -> Result<BigUint, AbiError> {
    Ok(BigUint::from_bytes_be(word_at(data, offset)?))
}

/// Offset/length words must fit in usize; anything wider is hostile input.
fn usize_at(data: &[u8], offset: usize) -> Result<usize, AbiError> {
    let word = word_at(data, offset)?;
    let (high, low) = word.split_at(WORD - 8);
    if high.iter().any(|&b| b != 0) {
        return Err(AbiError::OffsetOverflow);
    }
    let value = u64::from_be_bytes(low.try_into().expect("split is 8 bytes"));
    usize::try_from(value).map_err(|_| AbiError::OffsetOverflow)
}

/// Address words are left-padded to 32 bytes; the low 20 carry the address.
fn address_at(data: &[u8], offset: usize) -> Result<String, AbiError> {
    let word = word_at(data, offset)?;
    Ok(format!("0x{}", hex::encode(&word[WORD - 20..])))
}

/// Dynamic string: length word followed by right-padded UTF-8 bytes.
fn string_at(data: &[u8], offset: usize) -> Result<String, AbiError> {
    let len = usize_at(data, offset)?;
    let start = offset + WORD;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or(AbiError::Truncated {
            offset: start,
            needed: len,
            have: data.len(),
        })?;
    String::from_utf8(bytes.to_vec()).map_err(|_| AbiError::InvalidUtf8)
}

/// Decodes a `getAuctions()` response: a dynamic array of dynamic structs.
///
/// Layout: word 0 points at the array; the array is a length word followed by
/// one offset word per element (relative to the end of the length word), each
/// pointing at a struct encoding whose own string field is tail-encoded.
pub fn decode_auction_records(data: &[u8]) -> Result<Vec<Vec<AbiValue>>, AbiError> {
    let array_offset = usize_at(data, 0)?;
    let array = data.get(array_offset..).ok_or(AbiError::Truncated {
        offset: array_offset,
        needed: WORD,
        have: data.len(),
    })?;

    let len = usize_at(array, 0)?;
    let heads = &array[WORD..];
    // Each element needs at least a head word; rejects absurd length words
    // before any allocation happens.
    if len > heads.len() / WORD {
        return Err(AbiError::Truncated {
            offset: array_offset + WORD,
            needed: len.saturating_mul(WORD),
            have: heads.len(),
        });
    }

    let mut records = Vec::with_capacity(len);
    for i in 0..len {
        let element_offset = usize_at(heads, i * WORD)?;
        let element = heads.get(element_offset..).ok_or(AbiError::Truncated {
            offset: element_offset,
            needed: AUCTION_FIELDS * WORD,
            have: heads.len(),
        })?;
        records.push(decode_auction_struct(element)?);
    }
    Ok(records)
}

fn decode_auction_struct(data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    let description_offset = usize_at(data, 2 * WORD)?;
    Ok(vec![
        AbiValue::Uint(uint_at(data, 0)?),
        AbiValue::Address(address_at(data, WORD)?),
        AbiValue::Str(string_at(data, description_offset)?),
        AbiValue::Uint(uint_at(data, 3 * WORD)?),
        AbiValue::Address(address_at(data, 4 * WORD)?),
        AbiValue::Uint(uint_at(data, 5 * WORD)?),
        AbiValue::Uint(uint_at(data, 6 * WORD)?),
    ])
}

/// Decodes a single address return value (`getWinner`).
pub fn decode_address_return(data: &[u8]) -> Result<String, AbiError> {
    address_at(data, 0)
}

/// Extracts the revert reason from an `Error(string)` payload, if the payload
/// is one. Reasons pass through verbatim; nothing here interprets them.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != ERROR_SELECTOR {
        return None;
    }
    let body = &data[4..];
    let offset = usize_at(body, 0).ok()?;
    string_at(body, offset).ok()
}

fn push_uint(out: &mut Vec<u8>, value: &BigUint) -> Result<(), AbiError> {
    let bytes = value.to_bytes_be();
    if bytes.len() > WORD {
        return Err(AbiError::UintTooWide);
    }
    let mut word = [0u8; WORD];
    word[WORD - bytes.len()..].copy_from_slice(&bytes);
    out.extend_from_slice(&word);
    Ok(())
}

fn push_address(out: &mut Vec<u8>, address: &str) -> Result<(), AbiError> {
    let bad = || AbiError::BadAddress(address.to_string());
    let hex_part = address.strip_prefix("0x").ok_or_else(bad)?;
    let bytes = hex::decode(hex_part).map_err(|_| bad())?;
    if bytes.len() != 20 {
        return Err(bad());
    }
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(&bytes);
    Ok(())
}

fn push_string_tail(out: &mut Vec<u8>, value: &str) -> Result<(), AbiError> {
    push_uint(out, &BigUint::from(value.len()))?;
    out.extend_from_slice(value.as_bytes());
    let pad = (WORD - value.len() % WORD) % WORD;
    out.extend_from_slice(&vec![0u8; pad]);
    Ok(())
}

/// Encodes a function call: 4-byte selector followed by head/tail argument
/// encoding. Covers the argument kinds the contract surface uses.
pub fn encode_call(selector: [u8; 4], args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    let mut head = Vec::with_capacity(4 + args.len() * WORD);
    head.extend_from_slice(&selector);

    let head_len = args.len() * WORD;
    let mut tail: Vec<u8> = Vec::new();

    for arg in args {
        match arg {
            AbiValue::Uint(v) => push_uint(&mut head, v)?,
            AbiValue::Address(a) => push_address(&mut head, a)?,
            AbiValue::Str(s) => {
                push_uint(&mut head, &BigUint::from(head_len + tail.len()))?;
                push_string_tail(&mut tail, s)?;
            }
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}
