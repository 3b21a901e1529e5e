//! Preview arithmetic layered on top of a venue quote.

use rust_decimal::Decimal;
use serde::Serialize;

use super::FeeStrategy;
use super::precision::round_amount;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// The markup shown next to the venue's own preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeOverlay {
    /// Markup charged in the quote currency.
    pub fee_amount: Decimal,
    /// Markup as a percentage of notional (`0.5` means 0.5%).
    pub fee_percent: Decimal,
    /// Venue notional plus venue commission plus markup.
    pub total_cost: Decimal,
    /// Total cost per unit of the base asset.
    pub effective_price: Decimal,
}

impl FeeOverlay {
    /// Builds the overlay for a venue preview of `base_qty` at
    /// `execution_price`, where the venue itself charges `venue_commission`.
    ///
    /// `fee_amount` is supplied by the caller: the hold for quote orders, or
    /// the add-on fee for base orders.
    #[must_use]
    pub fn new(
        base_qty: Decimal,
        execution_price: Decimal,
        venue_commission: Decimal,
        fee_amount: Decimal,
        precision: u32,
    ) -> Self {
        let notional = base_qty * execution_price;
        let total_cost = total_cost(base_qty, execution_price, venue_commission, fee_amount);

        Self {
            fee_amount: round_amount(fee_amount, precision),
            fee_percent: fee_percent_of(fee_amount, notional).round_dp(4),
            total_cost: round_amount(total_cost, precision),
            effective_price: round_amount(effective_price(total_cost, base_qty), precision),
        }
    }

    /// Overlay for a base-denominated preview, where the markup is computed
    /// from the previewed notional.
    #[must_use]
    pub fn for_base_order(
        fees: &FeeStrategy,
        base_qty: Decimal,
        execution_price: Decimal,
        venue_commission: Decimal,
        precision: u32,
    ) -> Self {
        let fee = fees.fee(base_qty, execution_price);
        Self::new(base_qty, execution_price, venue_commission, fee, precision)
    }
}

/// `base_qty * execution_price + venue_fee + markup`.
#[must_use]
pub fn total_cost(
    base_qty: Decimal,
    execution_price: Decimal,
    venue_fee: Decimal,
    markup: Decimal,
) -> Decimal {
    base_qty * execution_price + venue_fee + markup
}

/// Cost per unit including every fee; zero when `base_qty` is zero.
#[must_use]
pub fn effective_price(total_cost: Decimal, base_qty: Decimal) -> Decimal {
    if base_qty.is_zero() {
        return Decimal::ZERO;
    }
    total_cost / base_qty
}

/// `fee / notional` expressed in percent; zero when `notional` is zero.
#[must_use]
pub fn fee_percent_of(fee: Decimal, notional: Decimal) -> Decimal {
    if notional.is_zero() {
        return Decimal::ZERO;
    }
    fee / notional * HUNDRED
}
