//! Quote-currency rounding rules.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places for fiat and stablecoin quote currencies.
pub const PRECISION_FIAT: u32 = 2;

/// Decimal places for crypto quote currencies and anything unrecognised.
pub const PRECISION_CRYPTO: u32 = 8;

/// Decimal places used for stored quantities.
pub const PRECISION_QTY: u32 = 8;

/// Extracts the quote currency from a `BASE-QUOTE` product id.
///
/// `"BTC-USD"` yields `Some("USD")`; ids without exactly one `-` yield `None`.
#[must_use]
pub fn quote_currency(product_id: &str) -> Option<&str> {
    let mut parts = product_id.split('-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(quote), None) if !quote.is_empty() => Some(quote),
        _ => None,
    }
}

/// Display precision for a quote currency.
#[must_use]
pub fn quote_precision(currency: &str) -> u32 {
    match currency {
        "USD" | "USDC" | "USDT" | "EUR" | "GBP" => PRECISION_FIAT,
        "BTC" | "ETH" => PRECISION_CRYPTO,
        _ => PRECISION_CRYPTO,
    }
}

/// Display precision for the quote side of a product id.
#[must_use]
pub fn product_quote_precision(product_id: &str) -> u32 {
    quote_currency(product_id).map_or(PRECISION_CRYPTO, quote_precision)
}

/// Rounds half away from zero, so `0.425` becomes `0.43` at two places.
#[must_use]
pub fn round_amount(value: Decimal, dp: u32) -> Decimal {
    value
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}
