//! Money and percentage helpers.
//!
//! # Responsibility
//! - Convert between `Decimal` amounts and integer minor units used by storage.
//! - Provide the rounding and ratio rules shared by reports and the ledger.
//!
//! # Invariants
//! - Amounts carry at most two decimal places.
//! - Amounts fit the original `max_digits=15, decimal_places=2` column shape.

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Number of decimal places stored for every amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest absolute amount in minor units (15 significant digits).
pub const MAX_MINOR_UNITS: i64 = 999_999_999_999_999;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("amount {0} has more than two decimal places")]
    TooPrecise(Decimal),
    #[error("amount {0} exceeds the supported range")]
    OutOfRange(Decimal),
}

/// Converts an amount into integer minor units (cents).
///
/// # Errors
/// - `TooPrecise` when the amount has more than two significant decimals.
/// - `OutOfRange` when the amount does not fit fifteen digits.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(MoneyError::TooPrecise(amount));
    }

    let mut scaled = amount;
    scaled.rescale(MONEY_SCALE);
    let units = scaled.mantissa();
    if units.abs() > i128::from(MAX_MINOR_UNITS) {
        return Err(MoneyError::OutOfRange(amount));
    }

    Ok(units as i64)
}

/// Converts stored minor units back into a two-place `Decimal`.
pub fn from_minor_units(units: i64) -> Decimal {
    Decimal::new(units, MONEY_SCALE)
}

/// Rounds to two places, half away from zero (the accounting convention).
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Returns `part / whole * 100` rounded to `places`, or zero when `whole` is zero.
pub fn percentage(part: Decimal, whole: Decimal, places: u32) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    (part / whole * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Integer-count flavour of [`percentage`].
pub fn count_percentage(part: u64, whole: u64, places: u32) -> Decimal {
    percentage(Decimal::from(part), Decimal::from(whole), places)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn minor_units_accept_two_places() {
        assert_eq!(to_minor_units(dec!(12.5)), Ok(1250));
        assert_eq!(to_minor_units(dec!(-0.01)), Ok(-1));
        assert_eq!(to_minor_units(dec!(7.000)), Ok(700));
        assert_eq!(from_minor_units(1250), dec!(12.50));
    }

    #[test]
    fn minor_units_reject_extra_precision_and_overflow() {
        assert!(matches!(
            to_minor_units(dec!(1.005)),
            Err(MoneyError::TooPrecise(_))
        ));
        assert!(matches!(
            to_minor_units(dec!(10000000000000.00)),
            Err(MoneyError::OutOfRange(_))
        ));
    }

    #[test]
    fn percentage_handles_zero_denominator() {
        assert_eq!(percentage(dec!(5), Decimal::ZERO, 2), Decimal::ZERO);
        assert_eq!(percentage(dec!(1), dec!(3), 2), dec!(33.33));
        assert_eq!(count_percentage(2, 3, 1), dec!(66.7));
    }

    #[test]
    fn round_money_uses_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round_money(dec!(3)).to_string(), "3.00");
    }
}
