//! Fee settlement for orders that reach a terminal status.
//!
//! A quote-denominated order has its markup withheld before the reduced
//! amount is sent to the venue. When the order only partially fills, the
//! markup actually earned is scaled to the executed value and the rest of
//! the hold is released as a rebate:
//!
//! ```text
//! fee_rate         = fee_held / requested_amount
//! filled_value     = cum_qty * avg_px
//! user_cost        = filled_value / (1 - fee_rate)
//! earned_fee       = min(user_cost * fee_rate, fee_held)
//! rebate           = fee_held - earned_fee
//! ```
//!
//! The fee rate is derived from the hold taken at placement time, so a fee
//! percent changed while the order was live does not affect its settlement.
//!
//! Orders without a hold (base-denominated) are charged the add-on fee on
//! the executed notional and never receive a rebate.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use super::FeeStrategy;
use super::precision::round_amount;

/// Fill data and fee metadata needed to settle one order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementInput {
    /// Cumulative filled quantity in base units.
    pub cum_qty: Decimal,
    /// Average execution price.
    pub avg_px: Decimal,
    /// Amount the user asked to spend, before the hold.
    pub requested_amount: Decimal,
    /// Markup withheld upfront; zero for base-denominated orders.
    pub fee_held: Decimal,
    /// Amount forwarded to the venue (`requested_amount - fee_held`).
    pub amount_sent: Decimal,
}

/// Outcome of settling a terminal order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SettlementResult {
    pub actual_filled_value: Decimal,
    pub actual_earned_fee: Decimal,
    pub rebate_amount: Decimal,
    pub settled: bool,
}

/// Parses a venue-supplied amount, treating anything unparsable as zero.
///
/// Every settlement rule treats zero conservatively, so an unreadable
/// quantity or price resolves the same way as "nothing happened".
#[must_use]
pub fn parse_or_zero(raw: &str) -> Decimal {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .unwrap_or_else(|_| {
            if !raw.is_empty() {
                debug!(value = raw, "unparsable amount treated as zero");
            }
            Decimal::ZERO
        })
}

/// Computes the earned fee and rebate for a terminal order.
///
/// All outputs are rounded to `precision` decimal places at the end; the
/// rebate is taken against the rounded earned fee so the hold is split
/// exactly between the two.
#[must_use]
pub fn settle(input: &SettlementInput, fees: &FeeStrategy, precision: u32) -> SettlementResult {
    let SettlementInput {
        cum_qty,
        avg_px,
        requested_amount,
        fee_held,
        ..
    } = *input;

    if cum_qty.is_zero() || avg_px.is_zero() {
        return finish(Decimal::ZERO, Decimal::ZERO, fee_held, precision);
    }

    match settle_filled(cum_qty, avg_px, requested_amount, fee_held, fees) {
        Some((filled_value, earned)) => finish(filled_value, earned, fee_held, precision),
        None => {
            warn!(%cum_qty, %avg_px, %fee_held, "settlement overflowed, refunding hold");
            finish(Decimal::ZERO, Decimal::ZERO, fee_held, precision)
        }
    }
}

/// Filled value and earned fee before rounding, or `None` if any step
/// overflows.
fn settle_filled(
    cum_qty: Decimal,
    avg_px: Decimal,
    requested_amount: Decimal,
    fee_held: Decimal,
    fees: &FeeStrategy,
) -> Option<(Decimal, Decimal)> {
    let filled_value = cum_qty.checked_mul(avg_px)?;

    if fee_held.is_zero() {
        return Some((filled_value, filled_value.checked_mul(fees.percent())?));
    }

    if requested_amount.is_zero() {
        return Some((filled_value, fee_held));
    }

    let fee_rate = fee_held.checked_div(requested_amount)?;
    let retained = Decimal::ONE.checked_sub(fee_rate)?;
    if retained <= Decimal::ZERO {
        return Some((filled_value, Decimal::ZERO));
    }

    let user_cost = filled_value.checked_div(retained)?;
    let earned = user_cost.checked_mul(fee_rate)?.min(fee_held);
    Some((filled_value, earned))
}

/// Rounds the raw figures and derives the rebate from the rounded fee.
fn finish(filled_value: Decimal, earned: Decimal, fee_held: Decimal, dp: u32) -> SettlementResult {
    let earned = round_amount(earned.max(Decimal::ZERO), dp);
    let earned = if fee_held.is_zero() { earned } else { earned.min(fee_held) };
    let rebate = (fee_held - earned).max(Decimal::ZERO);

    SettlementResult {
        actual_filled_value: round_amount(filled_value, dp),
        actual_earned_fee: earned,
        rebate_amount: round_amount(rebate, dp),
        settled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const USD: u32 = 2;

    fn half_percent() -> FeeStrategy {
        FeeStrategy::new(dec!(0.005)).unwrap()
    }

    fn input(cum_qty: Decimal, avg_px: Decimal, requested: Decimal, held: Decimal) -> SettlementInput {
        SettlementInput {
            cum_qty,
            avg_px,
            requested_amount: requested,
            fee_held: held,
            amount_sent: requested - held,
        }
    }

    #[test]
    fn full_fill_earns_whole_hold() {
        let result = settle(
            &input(dec!(0.00011718), dec!(85036.73), dec!(10), dec!(0.05)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, dec!(9.96));
        assert_eq!(result.actual_earned_fee, dec!(0.05));
        assert_eq!(result.rebate_amount, Decimal::ZERO);
        assert!(result.settled);
    }

    #[test]
    fn half_fill_rebates_half_the_hold() {
        let result = settle(
            &input(dec!(0.000995), dec!(50000), dec!(100), dec!(0.50)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, dec!(49.75));
        assert_eq!(result.actual_earned_fee, dec!(0.25));
        assert_eq!(result.rebate_amount, dec!(0.25));
    }

    #[test]
    fn no_fill_refunds_everything() {
        let result = settle(
            &input(Decimal::ZERO, dec!(85000), dec!(10), dec!(0.05)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, Decimal::ZERO);
        assert_eq!(result.actual_earned_fee, Decimal::ZERO);
        assert_eq!(result.rebate_amount, dec!(0.05));
    }

    #[test]
    fn zero_price_refunds_everything() {
        let result = settle(
            &input(dec!(0.001), Decimal::ZERO, dec!(10), dec!(0.05)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, Decimal::ZERO);
        assert_eq!(result.actual_earned_fee, Decimal::ZERO);
        assert_eq!(result.rebate_amount, dec!(0.05));
    }

    #[test]
    fn base_order_pays_add_on_fee() {
        let result = settle(
            &input(dec!(0.001), dec!(85000), Decimal::ZERO, Decimal::ZERO),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, dec!(85));
        assert_eq!(result.actual_earned_fee, dec!(0.43));
        assert_eq!(result.rebate_amount, Decimal::ZERO);
    }

    #[test]
    fn missing_requested_amount_keeps_hold() {
        let result = settle(
            &input(dec!(0.0001), dec!(50000), Decimal::ZERO, dec!(0.05)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, dec!(5));
        assert_eq!(result.actual_earned_fee, dec!(0.05));
        assert_eq!(result.rebate_amount, Decimal::ZERO);
    }

    #[test]
    fn degenerate_fee_rate_refunds_hold() {
        // Hold equal to the whole request leaves nothing to rate against.
        let result = settle(
            &input(dec!(0.0001), dec!(50000), dec!(10), dec!(10)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_earned_fee, Decimal::ZERO);
        assert_eq!(result.rebate_amount, dec!(10));
    }

    #[test]
    fn overfill_caps_earned_fee_at_hold() {
        let result = settle(
            &input(dec!(0.0003), dec!(50000), dec!(10), dec!(0.05)),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_earned_fee, dec!(0.05));
        assert_eq!(result.rebate_amount, Decimal::ZERO);
    }

    #[test]
    fn earned_plus_rebate_equals_hold() {
        let requested = dec!(250);
        let held = dec!(1.25);
        for fraction in [dec!(0.01), dec!(0.1), dec!(0.333), dec!(0.5), dec!(0.77), dec!(0.999)] {
            let sent_value = (requested - held) * fraction;
            let avg_px = dec!(64123.17);
            let cum_qty = (sent_value / avg_px).round_dp(8);
            let result = settle(&input(cum_qty, avg_px, requested, held), &half_percent(), USD);

            assert_eq!(result.actual_earned_fee + result.rebate_amount, held, "fraction {fraction}");
            assert!(result.actual_earned_fee >= Decimal::ZERO);
            assert!(result.actual_earned_fee <= held);
            assert!(result.rebate_amount >= Decimal::ZERO);
        }
    }

    #[test]
    fn overflowing_notional_refunds_hold() {
        let result = settle(
            &input(dec!(100000000000000000), dec!(10000000000000), dec!(10), dec!(0.05)),
            &half_percent(),
            USD,
        );
        assert!(result.settled);
        assert_eq!(result.actual_filled_value, Decimal::ZERO);
        assert_eq!(result.actual_earned_fee, Decimal::ZERO);
        assert_eq!(result.rebate_amount, dec!(0.05));
    }

    #[test]
    fn overflowing_base_order_earns_nothing() {
        let result = settle(
            &input(Decimal::MAX, dec!(2), Decimal::ZERO, Decimal::ZERO),
            &half_percent(),
            USD,
        );
        assert_eq!(result.actual_filled_value, Decimal::ZERO);
        assert_eq!(result.actual_earned_fee, Decimal::ZERO);
        assert_eq!(result.rebate_amount, Decimal::ZERO);
    }

    #[test]
    fn parse_or_zero_handles_junk() {
        assert_eq!(parse_or_zero("0.00011718"), dec!(0.00011718));
        assert_eq!(parse_or_zero(" 42 "), dec!(42));
        assert_eq!(parse_or_zero("1e-3"), dec!(0.001));
        assert_eq!(parse_or_zero(""), Decimal::ZERO);
        assert_eq!(parse_or_zero("n/a"), Decimal::ZERO);
    }
}
