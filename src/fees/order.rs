//! Order validation and preparation.
//!
//! Preparing a quote-denominated order withholds the markup before the
//! amount reaches the venue and produces the [`FeeMetadata`] that later
//! drives settlement. Base-denominated orders are forwarded untouched; their
//! fee is charged on top of the executed notional.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FeeStrategy;
use super::precision::{product_quote_precision, round_amount};
use crate::Result;

/// Order side in the venue's upper-case wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Parses `buy`/`BUY`/`Sell`… case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidOrder`](crate::MarkupError::InvalidOrder)
    /// for anything other than buy or sell.
    pub fn parse(side: &str) -> Result<Self> {
        match side.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(crate::MarkupError::InvalidOrder(format!(
                "side must be BUY or SELL, got {other:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type in the venue's upper-case wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    /// Parses `market`/`LIMIT`… case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidOrder`](crate::MarkupError::InvalidOrder)
    /// for unsupported types.
    pub fn parse(order_type: &str) -> Result<Self> {
        match order_type.trim().to_ascii_uppercase().as_str() {
            "MARKET" => Ok(Self::Market),
            "LIMIT" => Ok(Self::Limit),
            other => Err(crate::MarkupError::InvalidOrder(format!(
                "unsupported order type {other:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
        }
    }
}

/// How the order amount was specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderUnit {
    /// Quantity of the traded asset (e.g. BTC).
    Base(Decimal),
    /// Value in the settlement currency (e.g. USD).
    Quote(Decimal),
}

/// A user's order before any markup is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub product: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub unit: OrderUnit,
    pub limit_price: Option<Decimal>,
}

impl OrderRequest {
    /// Checks the request is well-formed before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::InvalidOrder`](crate::MarkupError::InvalidOrder)
    /// if the product is empty, the amount is not positive, or a limit order
    /// lacks a positive limit price.
    pub fn validate(&self) -> Result<()> {
        if self.product.trim().is_empty() {
            return Err(crate::MarkupError::InvalidOrder(
                "product is required".to_string(),
            ));
        }

        match self.unit {
            OrderUnit::Quote(value) if value <= Decimal::ZERO => {
                return Err(crate::MarkupError::InvalidOrder(
                    "quote value must be positive".to_string(),
                ));
            }
            OrderUnit::Base(qty) if qty <= Decimal::ZERO => {
                return Err(crate::MarkupError::InvalidOrder(
                    "base quantity must be positive".to_string(),
                ));
            }
            _ => {}
        }

        match (self.order_type, self.limit_price) {
            (OrderType::Limit, None) => Err(crate::MarkupError::InvalidOrder(
                "limit orders require a limit price".to_string(),
            )),
            (_, Some(price)) if price <= Decimal::ZERO => Err(crate::MarkupError::InvalidOrder(
                "limit price must be positive".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Fee hold recorded for a quote-denominated order until it settles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeMetadata {
    /// What the user asked to spend.
    pub user_requested_amount: Decimal,
    /// Markup withheld upfront.
    pub markup_held: Decimal,
    /// What was forwarded to the venue.
    pub amount_sent_to_venue: Decimal,
}

impl FeeMetadata {
    /// Splits a quote amount into the hold and the forwarded remainder.
    ///
    /// The hold is rounded to the product's quote precision.
    #[must_use]
    pub fn for_quote_order(product: &str, requested: Decimal, fees: &FeeStrategy) -> Self {
        let precision = product_quote_precision(product);
        let markup_held = round_amount(fees.fee_from_notional(requested), precision);

        Self {
            user_requested_amount: requested,
            markup_held,
            amount_sent_to_venue: requested - markup_held,
        }
    }
}

/// An order ready to forward to the venue, plus its fee hold if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedOrder {
    pub product: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub client_order_id: String,
    /// Set for base-denominated orders.
    pub base_quantity: Option<Decimal>,
    /// Set for quote-denominated orders; already net of the markup.
    pub quote_value: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    /// Present only for quote-denominated orders.
    pub metadata: Option<FeeMetadata>,
}

/// Validates `request` and applies the fee model for its unit.
///
/// Pass `with_client_order_id = false` for previews, which must not consume
/// an idempotency key.
///
/// # Errors
///
/// Propagates [`OrderRequest::validate`] failures.
pub fn prepare(
    request: &OrderRequest,
    fees: &FeeStrategy,
    with_client_order_id: bool,
) -> Result<PreparedOrder> {
    request.validate()?;

    let client_order_id = if with_client_order_id {
        Uuid::new_v4().to_string()
    } else {
        String::new()
    };

    let (base_quantity, quote_value, metadata) = match request.unit {
        OrderUnit::Quote(requested) => {
            let metadata = FeeMetadata::for_quote_order(&request.product, requested, fees);
            (None, Some(metadata.amount_sent_to_venue), Some(metadata))
        }
        OrderUnit::Base(qty) => (Some(qty), None, None),
    };

    Ok(PreparedOrder {
        product: request.product.trim().to_string(),
        side: request.side,
        order_type: request.order_type,
        client_order_id,
        base_quantity,
        quote_value,
        limit_price: request.limit_price,
        metadata,
    })
}
