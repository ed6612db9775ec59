//! Currency unit conversion and display labels.
//!
//! On-chain amounts arrive in wei (10^-18 coin). Conversion to whole-coin
//! decimal strings is exact in both directions; anything that cannot be
//! represented at 18 decimals is rejected instead of rounded.

use num_bigint::BigUint;
use thiserror::Error;

use crate::models::SENTINEL_ADDRESS;

/// Contract currency precision: 1 coin = 10^18 wei.
pub const ETHER_DECIMALS: usize = 18;

/// Minimum opening bid, whole-coin units.
pub const MIN_BID: &str = "0.01";

/// [`MIN_BID`] as a wei amount, for comparisons.
pub fn min_bid_wei() -> BigUint {
    pow10(ETHER_DECIMALS - 2)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitsError {
    #[error("not a decimal amount: {0:?}")]
    InvalidAmount(String),
    #[error("amount {0:?} has more than 18 fractional digits")]
    TooManyDecimals(String),
}

fn pow10(exp: usize) -> BigUint {
    BigUint::from(10u8).pow(exp as u32)
}

/// Formats a wei amount as a whole-coin decimal string, losslessly.
///
/// Matches ethers `formatEther`: trailing fractional zeros are trimmed but at
/// least one fractional digit remains, so zero renders as "0.0".
pub fn format_ether(wei: &BigUint) -> String {
    let scale = pow10(ETHER_DECIMALS);
    let whole = wei / &scale;
    let frac = wei % &scale;

    let frac_digits = format!("{:0>width$}", frac.to_str_radix(10), width = ETHER_DECIMALS);
    let trimmed = frac_digits.trim_end_matches('0');
    if trimmed.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{trimmed}")
    }
}

/// Parses a whole-coin decimal string into wei, losslessly.
///
/// Accepts plain unsigned decimals ("1", "0.01", ".5"). More than 18
/// fractional digits is an error rather than a silent rounding.
pub fn parse_ether(amount: &str) -> Result<BigUint, UnitsError> {
    let amount = amount.trim();
    let invalid = || UnitsError::InvalidAmount(amount.to_string());

    let (whole_part, frac_part) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }
    if !whole_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if frac_part.len() > ETHER_DECIMALS {
        return Err(UnitsError::TooManyDecimals(amount.to_string()));
    }

    let whole: BigUint = if whole_part.is_empty() {
        BigUint::default()
    } else {
        whole_part.parse().map_err(|_| invalid())?
    };
    let frac: BigUint = if frac_part.is_empty() {
        BigUint::default()
    } else {
        frac_part.parse().map_err(|_| invalid())?
    };

    Ok(whole * pow10(ETHER_DECIMALS) + frac * pow10(ETHER_DECIMALS - frac_part.len()))
}

/// Display label for a whole-coin amount string: "Sin pujas" for zero,
/// "< 0.001 BNB" for dust, otherwise three decimals.
pub fn format_bnb_label(amount: &str) -> String {
    let value: f64 = match amount.parse() {
        Ok(v) => v,
        Err(_) => return "0 BNB".to_string(),
    };
    if value == 0.0 {
        "Sin pujas".to_string()
    } else if value < 0.001 {
        "< 0.001 BNB".to_string()
    } else {
        format!("{value:.3} BNB")
    }
}

/// Shortened address for display: `0x49A9...7781` style; the sentinel
/// address reads as "no bids".
pub fn format_address_short(address: &str) -> String {
    if address == SENTINEL_ADDRESS {
        return "Sin pujas".to_string();
    }
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}
