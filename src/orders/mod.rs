//! Order-update processing: audit trail, record upkeep and fee settlement.
//!
//! Every order in an `orders` frame is appended to the audit log, merged
//! into its [`OrderRecord`] and, once the venue reports a terminal status,
//! settled against the fee hold taken when it was placed.

pub mod metadata;
pub mod store;

use std::sync::Arc;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{error, info, warn};

use crate::Result;
use crate::error::MarkupError;
use crate::fees::precision::{PRECISION_FIAT, PRECISION_QTY, product_quote_precision, round_amount};
use crate::fees::settlement::{SettlementInput, parse_or_zero};
use crate::fees::{FeeStrategy, SettlementResult, settle};
use crate::models::orders::{OrderUpdate, OrdersMessage};

pub use metadata::{FeeMetadata, MetadataStore};
pub use store::{MemoryOrderStore, OrderEvent, OrderRecord, OrderStore};

/// Statuses after which the venue sends no further fills.
pub const TERMINAL_STATUSES: [&str; 3] = ["FILLED", "CANCELLED", "REJECTED"];

pub fn is_terminal(status: &str) -> bool {
    TERMINAL_STATUSES.contains(&status)
}

/// Applies `orders` channel updates to an [`OrderStore`].
pub struct OrderProcessor {
    fees: FeeStrategy,
    metadata: Arc<MetadataStore>,
    store: Arc<dyn OrderStore>,
}

impl OrderProcessor {
    pub fn new(fees: FeeStrategy, metadata: Arc<MetadataStore>, store: Arc<dyn OrderStore>) -> Self {
        Self {
            fees,
            metadata,
            store,
        }
    }

    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Processes every order in `message` and returns how many were stored.
    ///
    /// A failure on one order is logged and does not stop the rest.
    pub fn process(&self, message: &OrdersMessage) -> usize {
        let received_at = parse_timestamp(&message.timestamp);
        let mut processed = 0;

        for event in &message.events {
            let event_type = if event.tpe.is_empty() {
                warn!("order event without type");
                "unknown"
            } else {
                event.tpe.as_str()
            };

            for raw in &event.orders {
                match self.process_order(raw, event_type, message.sequence_num, received_at) {
                    Ok(_) => processed += 1,
                    Err(e) => {
                        error!(
                            order_id = raw.get("order_id").and_then(|v| v.as_str()).unwrap_or(""),
                            error = %e,
                            "Failed to process order update"
                        );
                    }
                }
            }
        }

        processed
    }

    /// Applies a single order object and returns the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::MalformedMessage`] if the order is not an
    /// object or has no id, and propagates store failures.
    pub fn process_order(
        &self,
        raw: &serde_json::Value,
        event_type: &str,
        sequence_num: i64,
        received_at: OffsetDateTime,
    ) -> Result<OrderRecord> {
        let update = OrderUpdate::from_value(raw)
            .map_err(|e| MarkupError::MalformedMessage(format!("order update: {e}")))?;
        if update.order_id.is_empty() {
            return Err(MarkupError::MalformedMessage("missing order_id".to_string()));
        }

        self.store.append_event(OrderEvent {
            id: 0,
            order_id: update.order_id.clone(),
            sequence_num,
            event_type: event_type.to_string(),
            status: update.status.clone(),
            cum_qty: update.cum_qty.clone(),
            leaves_qty: update.leaves_qty.clone(),
            avg_px: update.avg_px.clone(),
            net_avg_px: update.net_avg_px.clone(),
            fees: update.fees.clone(),
            commission: update.commission.clone(),
            venue_fee: update.venue_fee.clone(),
            ces_commission: update.ces_commission.clone(),
            raw_json: raw.to_string(),
            received_at,
        })?;

        let existing = self.store.get(&update.order_id)?;
        let metadata = self
            .metadata
            .get(&update.order_id)
            .or_else(|| existing.as_ref().map(|r| r.metadata))
            .unwrap_or_default();

        let terminal = is_terminal(&update.status);
        let settlement = if terminal && !metadata.markup_held.is_zero() {
            let result = self.settle(&update, &metadata);
            if !result.rebate_amount.is_zero() {
                info!(
                    order_id = %update.order_id,
                    status = %update.status,
                    filled_value = %result.actual_filled_value,
                    earned_fee = %result.actual_earned_fee,
                    rebate = %result.rebate_amount,
                    "Fee settlement calculated"
                );
            }
            result
        } else {
            SettlementResult::default()
        };

        let record = OrderRecord {
            order_id: update.order_id.clone(),
            client_order_id: update.client_order_id.clone(),
            product_id: update.product_id.clone(),
            side: update.side.clone(),
            order_type: update.order_type.clone(),
            status: update.status.clone(),
            cum_qty: qty(&update.cum_qty),
            leaves_qty: qty(&update.leaves_qty),
            avg_px: price(&update.avg_px),
            net_avg_px: price(&update.net_avg_px),
            fees: price(&update.fees),
            commission: price(&update.commission),
            venue_fee: price(&update.venue_fee),
            ces_commission: price(&update.ces_commission),
            metadata,
            settlement,
            first_seen_at: existing.as_ref().map_or(received_at, |r| r.first_seen_at),
            last_updated_at: received_at,
        };
        self.store.upsert(record.clone())?;

        if terminal {
            self.metadata.remove(&update.order_id);
        }

        let status_changed = existing.as_ref().is_none_or(|r| r.status != update.status);
        let open_transition = update.status == "OPEN" && status_changed;
        if terminal || !record.cum_qty.is_zero() || open_transition {
            info!(
                order_id = %update.order_id,
                client_order_id = %update.client_order_id,
                status = %update.status,
                filled = %update.cum_qty,
                price = %update.avg_px,
                "Order event"
            );
        }

        Ok(record)
    }

    fn settle(&self, update: &OrderUpdate, metadata: &FeeMetadata) -> SettlementResult {
        let input = SettlementInput {
            cum_qty: parse_or_zero(&update.cum_qty),
            avg_px: parse_or_zero(&update.avg_px),
            requested_amount: metadata.user_requested_amount,
            fee_held: metadata.markup_held,
            amount_sent: metadata.amount_sent_to_venue,
        };
        settle(&input, &self.fees, product_quote_precision(&update.product_id))
    }
}

/// RFC 3339 timestamp from the frame, or now when absent or unreadable.
fn parse_timestamp(raw: &str) -> OffsetDateTime {
    OffsetDateTime::parse(raw, &Rfc3339).unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn qty(raw: &str) -> Decimal {
    round_amount(parse_or_zero(raw), PRECISION_QTY)
}

fn price(raw: &str) -> Decimal {
    round_amount(parse_or_zero(raw), PRECISION_FIAT)
}
