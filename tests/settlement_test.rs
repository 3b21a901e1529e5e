//! Settlement and fee-model scenarios.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use prime_markup::fees::order::{FeeMetadata, OrderRequest, OrderSide, OrderType, OrderUnit, prepare};
use prime_markup::fees::settlement::SettlementInput;
use prime_markup::fees::precision::PRECISION_FIAT;
use prime_markup::fees::{FeeStrategy, settle};

fn fees(percent: Decimal) -> FeeStrategy {
    FeeStrategy::new(percent).expect("valid fee percent")
}

fn quote_input(cum_qty: Decimal, avg_px: Decimal, requested: Decimal, held: Decimal) -> SettlementInput {
    SettlementInput {
        cum_qty,
        avg_px,
        requested_amount: requested,
        fee_held: held,
        amount_sent: requested - held,
    }
}

#[test]
fn test_full_fill_earns_entire_hold() {
    let input = quote_input(dec!(0.00011718), dec!(85036.73), dec!(10), dec!(0.05));
    let result = settle(&input, &fees(dec!(0.005)), PRECISION_FIAT);

    assert!(result.settled);
    assert_eq!(result.actual_filled_value, dec!(9.96));
    assert_eq!(result.actual_earned_fee, dec!(0.05));
    assert_eq!(result.rebate_amount, dec!(0));
}

#[test]
fn test_half_fill_rebates_half_the_hold() {
    let input = quote_input(dec!(0.000995), dec!(50000), dec!(100), dec!(0.50));
    let result = settle(&input, &fees(dec!(0.005)), PRECISION_FIAT);

    assert_eq!(result.actual_filled_value, dec!(49.75));
    assert_eq!(result.actual_earned_fee, dec!(0.25));
    assert_eq!(result.rebate_amount, dec!(0.25));
}

#[test]
fn test_cancel_without_fill_refunds_everything() {
    let input = quote_input(dec!(0), dec!(85000), dec!(10), dec!(0.05));
    let result = settle(&input, &fees(dec!(0.005)), PRECISION_FIAT);

    assert_eq!(result.actual_filled_value, dec!(0));
    assert_eq!(result.actual_earned_fee, dec!(0));
    assert_eq!(result.rebate_amount, dec!(0.05));
}

#[test]
fn test_zero_price_is_treated_as_no_fill() {
    let input = quote_input(dec!(0.5), dec!(0), dec!(10), dec!(0.05));
    let result = settle(&input, &fees(dec!(0.005)), PRECISION_FIAT);

    assert_eq!(result.actual_earned_fee, dec!(0));
    assert_eq!(result.rebate_amount, dec!(0.05));
}

#[test]
fn test_base_order_earns_rounded_fee_on_notional() {
    let input = quote_input(dec!(0.001), dec!(85000), dec!(0), dec!(0));
    let result = settle(&input, &fees(dec!(0.005)), PRECISION_FIAT);

    assert_eq!(result.actual_filled_value, dec!(85));
    assert_eq!(result.actual_earned_fee, dec!(0.43));
    assert_eq!(result.rebate_amount, dec!(0));
}

#[test]
fn test_earned_plus_rebate_always_equals_hold() {
    let fee_strategy = fees(dec!(0.005));
    let requested_amounts = [dec!(10), dec!(25.37), dec!(100), dec!(999.99), dec!(12345.67)];
    let prices = [dec!(0.35), dec!(1.0001), dec!(2650.12), dec!(85036.73)];

    for requested in requested_amounts {
        let metadata = FeeMetadata::for_quote_order("BTC-USD", requested, &fee_strategy);
        for price in prices {
            let full_qty = metadata.amount_sent_to_venue / price;
            for fill in [dec!(0), dec!(0.1), dec!(0.333), dec!(0.5), dec!(0.999), dec!(1)] {
                let input = quote_input(
                    full_qty * fill,
                    price,
                    metadata.user_requested_amount,
                    metadata.markup_held,
                );
                let result = settle(&input, &fee_strategy, PRECISION_FIAT);

                assert_eq!(
                    result.actual_earned_fee + result.rebate_amount,
                    metadata.markup_held,
                    "requested {requested} price {price} fill {fill}"
                );
                assert!(result.actual_earned_fee >= Decimal::ZERO);
                assert!(result.actual_earned_fee <= metadata.markup_held);
            }
        }
    }
}

#[test]
fn test_prepared_quote_order_forwards_net_amount() {
    let request = OrderRequest {
        product: "BTC-USD".to_string(),
        side: OrderSide::Buy,
        order_type: OrderType::Market,
        unit: OrderUnit::Quote(dec!(10)),
        limit_price: None,
    };

    let prepared = prepare(&request, &fees(dec!(0.005)), true).unwrap();
    let metadata = prepared.metadata.unwrap();

    assert_eq!(metadata.markup_held, dec!(0.05));
    assert_eq!(prepared.quote_value, Some(dec!(9.95)));
    assert_eq!(prepared.base_quantity, None);
    assert!(!prepared.client_order_id.is_empty());
}

#[test]
fn test_adjusted_prices_bracket_the_venue_price() {
    let fee_strategy = fees(dec!(0.002));
    for (price, qty) in [(dec!(100), dec!(1)), (dec!(85000.10), dec!(0.25)), (dec!(0.0001), dec!(5000))] {
        assert!(fee_strategy.adjust_ask_price(price, qty) >= price);
        assert!(fee_strategy.adjust_bid_price(price, qty) <= price);
        assert_eq!(fee_strategy.adjust_ask_price(price, dec!(0)), price);
        assert_eq!(fee_strategy.adjust_bid_price(price, dec!(0)), price);
    }
}
