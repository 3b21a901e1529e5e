//! Plain-text rendering of an order book with fee-adjusted prices.

use std::fmt::Write;

use rust_decimal::Decimal;
use time::macros::format_description;

use crate::book::OrderBookSnapshot;
use crate::fees::overlay::FeeOverlay;
use crate::fees::{FeeStrategy, product_quote_precision, round_amount};

/// Levels shown per side.
pub const DISPLAY_LEVELS: usize = 10;

const RULE: &str = "═══════════════════════════════════════════════════════════════";

/// Renders `snapshot` as a table: asks from worst to best, the spread, then
/// bids from best to worst. Each row shows size, venue price and the price
/// after the markup on a one-unit trade.
pub fn render_book(snapshot: &OrderBookSnapshot, fees: &FeeStrategy, levels: usize) -> String {
    let mut out = String::new();
    let clock = snapshot
        .update_time
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();

    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "  {} Order Book @ {clock}", snapshot.product);
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "  {:<15} {:<15} {:<15}", "ASK SIZE", "ASK PRICE", "ADJ PRICE");
    let _ = writeln!(out, "  {:<15} {:<15} {:<15}", "--------", "---------", "---------");
    for ask in snapshot.asks.iter().take(levels).rev() {
        let adjusted = fees.adjust_ask_price(ask.price, Decimal::ONE);
        let _ = writeln!(
            out,
            "  {:<15} {:<15} {:<15}",
            fixed(ask.size, 4),
            fixed(ask.price, 2),
            fixed(adjusted, 2)
        );
    }

    if let Some(spread) = snapshot.spread() {
        let _ = writeln!(out, "\n  {:<15} {:<15}", "", "SPREAD");
        let _ = writeln!(out, "  {:<15} {:<15}", "", "------");
        let _ = writeln!(out, "  {:<15} {}\n", "", fixed(spread, 2));
    }

    let _ = writeln!(out, "  {:<15} {:<15} {:<15}", "BID SIZE", "BID PRICE", "ADJ PRICE");
    let _ = writeln!(out, "  {:<15} {:<15} {:<15}", "--------", "---------", "---------");
    for bid in snapshot.bids.iter().take(levels) {
        let adjusted = fees.adjust_bid_price(bid.price, Decimal::ONE);
        let _ = writeln!(
            out,
            "  {:<15} {:<15} {:<15}",
            fixed(bid.size, 4),
            fixed(bid.price, 2),
            fixed(adjusted, 2)
        );
    }

    out
}

/// Cost of buying `qty` at the best ask with the markup on top.
///
/// `None` when the book has no asks, `qty` is not positive or the notional
/// does not fit in a decimal.
pub fn render_preview(snapshot: &OrderBookSnapshot, fees: &FeeStrategy, qty: Decimal) -> Option<String> {
    if qty <= Decimal::ZERO {
        return None;
    }
    let best_ask = snapshot.asks.first()?;
    let notional = qty.checked_mul(best_ask.price)?;
    notional.checked_add(fees.fee_from_notional(notional))?;

    let precision = product_quote_precision(&snapshot.product);
    let overlay = FeeOverlay::for_base_order(fees, qty, best_ask.price, Decimal::ZERO, precision);
    Some(format!(
        "  Buy {} @ {}: markup {} ({}%), total {}, effective {}\n",
        qty.normalize(),
        fixed(best_ask.price, 2),
        fixed(overlay.fee_amount, precision),
        overlay.fee_percent.normalize(),
        fixed(overlay.total_cost, precision),
        fixed(overlay.effective_price, precision),
    ))
}

/// Half-away-from-zero rounding padded to exactly `dp` places.
fn fixed(value: Decimal, dp: u32) -> String {
    format!("{:.*}", dp as usize, round_amount(value, dp))
}
