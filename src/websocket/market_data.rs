//! `l2_data` channel handler.

use std::sync::Arc;

use tracing::{debug, warn};

use super::ChannelHandler;
use crate::Result;
use crate::book::OrderBookStore;
use crate::error::MarkupError;
use crate::models::Channel;
use crate::models::market_data::L2DataMessage;

/// Feeds level-2 snapshots and updates into an [`OrderBookStore`].
pub struct MarketDataHandler {
    products: Vec<String>,
    books: Arc<OrderBookStore>,
}

impl MarketDataHandler {
    pub fn new(products: Vec<String>, books: Arc<OrderBookStore>) -> Self {
        Self { products, books }
    }

    pub fn books(&self) -> &Arc<OrderBookStore> {
        &self.books
    }
}

impl ChannelHandler for MarketDataHandler {
    fn channel_name(&self) -> &str {
        Channel::L2Data.as_str()
    }

    fn product_ids(&self) -> &[String] {
        &self.products
    }

    fn handle_message(&self, message: serde_json::Value) -> Result<()> {
        let message: L2DataMessage = serde_json::from_value(message)
            .map_err(|e| MarkupError::MalformedMessage(format!("l2_data frame: {e}")))?;
        if message.events.is_empty() {
            return Err(MarkupError::MalformedMessage(
                "l2_data frame without events".to_string(),
            ));
        }

        for event in &message.events {
            if event.tpe.is_empty() || event.product_id.is_empty() {
                warn!(
                    event_type = %event.tpe,
                    product = %event.product_id,
                    "Skipping l2_data event without type or product_id"
                );
                continue;
            }

            let updates = event.level_updates();
            let book = self.books.get_or_create(&event.product_id);
            if event.is_snapshot() {
                book.apply_snapshot(&updates);
            } else {
                book.apply_delta(&updates);
            }

            debug!(
                product = %event.product_id,
                event_type = %event.tpe,
                levels = updates.len(),
                "Applied book event"
            );
        }

        Ok(())
    }
}
