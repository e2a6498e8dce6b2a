//! Decimal amount conversions
//!
//! Amounts cross the API as decimal strings. On-chain values are integer
//! base units scaled by the asset's decimals.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Largest scale `Decimal` can represent
pub const MAX_DECIMALS: u8 = 28;

const BPS_DENOMINATOR: u128 = 10_000;

/// Parse a strictly positive human-readable amount
pub fn parse_amount(amount: &str) -> Result<Decimal> {
    let trimmed = amount.trim();
    let value = Decimal::from_str(trimmed)
        .map_err(|e| Error::InvalidAmount(format!("{:?}: {}", trimmed, e)))?;

    if value <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "{:?}: must be greater than zero",
            trimmed
        )));
    }

    Ok(value)
}

/// Convert "1.5" with 6 decimals into 1_500_000 base units
pub fn to_base_units(amount: &str, decimals: u8) -> Result<u128> {
    let value = parse_amount(amount)?.normalize();
    let scale = value.scale();

    if scale > u32::from(decimals) {
        return Err(Error::InvalidAmount(format!(
            "{} has more than {} fractional digits",
            value, decimals
        )));
    }

    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| Error::InvalidAmount(format!("{} is negative", value)))?;

    10u128
        .checked_pow(u32::from(decimals) - scale)
        .and_then(|factor| mantissa.checked_mul(factor))
        .ok_or_else(|| Error::InvalidAmount(format!("{} overflows base units", value)))
}

/// Convert a base-unit decimal string back to a human-readable amount
pub fn from_base_units(raw: &str, decimals: u8) -> Result<Decimal> {
    if decimals > MAX_DECIMALS {
        return Err(Error::InvalidAmount(format!(
            "{} decimals exceeds the supported maximum of {}",
            decimals, MAX_DECIMALS
        )));
    }

    let units: i128 = raw
        .trim()
        .parse::<u128>()
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or_else(|| Error::InvalidAmount(format!("{:?} is not an integer amount", raw)))?;

    Decimal::try_from_i128_with_scale(units, u32::from(decimals))
        .map_err(|e| Error::InvalidAmount(format!("{}: {}", raw, e)))
}

/// Lower bound of `raw` after allowing `slippage_bps` of deviation
pub fn min_out(raw: u128, slippage_bps: u32) -> u128 {
    let keep = BPS_DENOMINATOR.saturating_sub(u128::from(slippage_bps));
    raw / BPS_DENOMINATOR * keep + raw % BPS_DENOMINATOR * keep / BPS_DENOMINATOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(to_base_units("100", 18).unwrap(), 100_000_000_000_000_000_000);
        assert_eq!(to_base_units(" 0.000001 ", 6).unwrap(), 1);
        assert_eq!(to_base_units("2.50", 1).unwrap(), 25);
    }

    #[test]
    fn test_rejects_bad_amounts() {
        assert!(matches!(parse_amount("0"), Err(Error::InvalidAmount(_))));
        assert!(matches!(parse_amount("-3"), Err(Error::InvalidAmount(_))));
        assert!(matches!(parse_amount("1e5x"), Err(Error::InvalidAmount(_))));
        assert!(matches!(to_base_units("0.0000001", 6), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_from_base_units() {
        assert_eq!(from_base_units("1500000", 6).unwrap(), Decimal::new(15, 1));
        assert_eq!(from_base_units("0", 18).unwrap(), Decimal::ZERO);
        assert!(from_base_units("1.5", 6).is_err());
        assert!(from_base_units("1", 30).is_err());
    }

    #[test]
    fn test_min_out() {
        assert_eq!(min_out(1_000_000, 50), 995_000);
        assert_eq!(min_out(10, 0), 10);
        assert_eq!(min_out(u128::MAX, 10_000), 0);
    }
}
