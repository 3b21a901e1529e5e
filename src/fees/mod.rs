//! Percentage fee model and fee-adjusted display prices.
//!
//! - [`precision`] - Quote-currency rounding rules
//! - [`order`] - Order validation and preparation (fee hold for quote orders)
//! - [`overlay`] - Preview arithmetic layered on a venue quote
//! - [`settlement`] - Terminal-state rebate computation

pub mod order;
pub mod overlay;
pub mod precision;
pub mod settlement;

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::Result;

pub use precision::{product_quote_precision, quote_currency, quote_precision, round_amount};
pub use settlement::{SettlementResult, settle};

/// A markup expressed as a fraction of notional (`0.005` is 0.5%).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeStrategy {
    percent: Decimal,
}

impl FeeStrategy {
    /// Creates a strategy from an already-validated fraction.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Config`](crate::MarkupError::Config) if
    /// `percent` is negative.
    pub fn new(percent: Decimal) -> Result<Self> {
        if percent.is_sign_negative() && !percent.is_zero() {
            return Err(crate::MarkupError::Config(
                "fee percent cannot be negative".to_string(),
            ));
        }
        Ok(Self { percent })
    }

    /// Parses a fee fraction such as `"0.002"`.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Config`](crate::MarkupError::Config) if the
    /// string is not a decimal or is negative.
    pub fn parse(percent: &str) -> Result<Self> {
        let percent = Decimal::from_str(percent.trim())
            .map_err(|e| crate::MarkupError::Config(format!("invalid fee percent: {e}")))?;
        Self::new(percent)
    }

    /// The configured fraction.
    #[must_use]
    pub fn percent(&self) -> Decimal {
        self.percent
    }

    /// Fee for `qty` units at `price`.
    #[must_use]
    pub fn fee(&self, qty: Decimal, price: Decimal) -> Decimal {
        self.fee_from_notional(qty * price)
    }

    /// Fee on a notional value already expressed in the quote currency.
    #[must_use]
    pub fn fee_from_notional(&self, notional: Decimal) -> Decimal {
        notional * self.percent
    }

    /// Per-unit price a buyer pays once the markup is added.
    ///
    /// Returns `price` unchanged when `qty` is zero.
    #[must_use]
    pub fn adjust_ask_price(&self, price: Decimal, qty: Decimal) -> Decimal {
        if qty.is_zero() {
            return price;
        }
        let notional = qty * price;
        (notional + self.fee(qty, price)) / qty
    }

    /// Per-unit price a seller receives once the markup is taken.
    ///
    /// Returns `price` unchanged when `qty` is zero.
    #[must_use]
    pub fn adjust_bid_price(&self, price: Decimal, qty: Decimal) -> Decimal {
        if qty.is_zero() {
            return price;
        }
        let notional = qty * price;
        (notional - self.fee(qty, price)) / qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fee_is_percent_of_notional() {
        let cases = [
            (dec!(0.001), dec!(1.0), dec!(50000.00), dec!(50)),
            (dec!(0.005), dec!(2.5), dec!(40000.00), dec!(500)),
            (dec!(0.01), dec!(0.1), dec!(1000.00), dec!(1)),
            (dec!(0.001), dec!(0), dec!(50000.00), dec!(0)),
        ];
        for (percent, qty, price, expected) in cases {
            let strategy = FeeStrategy::new(percent).unwrap();
            assert_eq!(strategy.fee(qty, price), expected, "{percent} of {qty}@{price}");
        }
    }

    #[test]
    fn fee_from_notional_matches_fee() {
        let strategy = FeeStrategy::new(dec!(0.002)).unwrap();
        assert_eq!(
            strategy.fee_from_notional(dec!(1250)),
            strategy.fee(dec!(0.025), dec!(50000))
        );
    }

    #[test]
    fn adjust_bid_price_reduces_by_fee() {
        let strategy = FeeStrategy::new(dec!(0.001)).unwrap();
        assert_eq!(strategy.adjust_bid_price(dec!(50000), dec!(1)), dec!(49950));
        assert_eq!(strategy.adjust_bid_price(dec!(1000), dec!(1)), dec!(999));
    }

    #[test]
    fn adjust_ask_price_increases_by_fee() {
        let strategy = FeeStrategy::new(dec!(0.001)).unwrap();
        assert_eq!(strategy.adjust_ask_price(dec!(50000), dec!(1)), dec!(50050));
        assert_eq!(strategy.adjust_ask_price(dec!(1000), dec!(2)), dec!(1001));
    }

    #[test]
    fn adjusted_prices_bracket_the_raw_price() {
        let strategy = FeeStrategy::new(dec!(0.0025)).unwrap();
        for (price, qty) in [
            (dec!(85036.73), dec!(0.5)),
            (dec!(0.0001), dec!(1000000)),
            (dec!(3125.125), dec!(3)),
        ] {
            assert!(strategy.adjust_ask_price(price, qty) >= price);
            assert!(strategy.adjust_bid_price(price, qty) <= price);
        }
    }

    #[test]
    fn zero_quantity_returns_unadjusted_price() {
        let strategy = FeeStrategy::new(dec!(0.01)).unwrap();
        assert_eq!(strategy.adjust_ask_price(dec!(42000), Decimal::ZERO), dec!(42000));
        assert_eq!(strategy.adjust_bid_price(dec!(42000), Decimal::ZERO), dec!(42000));
    }

    #[test]
    fn parse_accepts_valid_percent() {
        let strategy = FeeStrategy::parse(" 0.002 ").unwrap();
        assert_eq!(strategy.percent(), dec!(0.002));
    }

    #[test]
    fn parse_rejects_negative_and_garbage() {
        assert!(FeeStrategy::parse("-0.001").is_err());
        assert!(FeeStrategy::parse("two percent").is_err());
        assert!(FeeStrategy::parse("").is_err());
    }

    #[test]
    fn zero_percent_is_allowed() {
        let strategy = FeeStrategy::parse("0").unwrap();
        assert_eq!(strategy.fee(dec!(1), dec!(100)), Decimal::ZERO);
    }
}
