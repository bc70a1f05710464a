//! Currency arithmetic helpers.
//!
//! Amounts are carried at full `Decimal` precision through every
//! calculation. Rounding to cents happens once, when a value is displayed
//! or written to a snapshot, and uses banker's rounding so that rounding
//! many shares does not drift in one direction.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

pub const CURRENCY_DECIMAL_PLACES: u32 = 2;

/// Violation message for a figure that does not fit in a `Decimal`.
pub const AMOUNT_TOO_LARGE: &str = "is too large to compute";

pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DECIMAL_PLACES, RoundingStrategy::MidpointNearestEven)
}

/// `base * percent / 100`, unrounded. Very large bases are scaled down
/// first; `None` when the result itself does not fit.
pub fn percent_of(base: Decimal, percent: Decimal) -> Option<Decimal> {
    match base.checked_mul(percent) {
        Some(product) => product.checked_div(Decimal::ONE_HUNDRED),
        None => base
            .checked_div(Decimal::ONE_HUNDRED)?
            .checked_mul(percent),
    }
}

pub fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::{parse_amount, percent_of, round_currency};

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round_currency(dec!(2.345)), dec!(2.34));
        assert_eq!(round_currency(dec!(2.355)), dec!(2.36));
        assert_eq!(round_currency(dec!(-10.005)), dec!(-10.00));
        assert_eq!(round_currency(dec!(33.333333)), dec!(33.33));
    }

    #[test]
    fn percent_of_keeps_precision() {
        assert_eq!(percent_of(dec!(1000), dec!(40)), Some(dec!(400)));
        assert_eq!(percent_of(dec!(0.10), dec!(33.3)), Some(dec!(0.0333)));
    }

    #[test]
    fn percent_of_handles_the_largest_amounts() {
        assert_eq!(percent_of(Decimal::MAX, dec!(100)), Some(Decimal::MAX));
        assert_eq!(percent_of(Decimal::MAX, dec!(101)), None);
        assert_eq!(percent_of(Decimal::MAX, dec!(0)), Some(Decimal::ZERO));
    }

    #[test]
    fn parses_stored_amounts() {
        assert_eq!(parse_amount(" 12.50 "), Some(dec!(12.50)));
        assert_eq!(parse_amount("twelve"), None);
    }
}
