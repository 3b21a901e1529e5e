//! `orders` channel handler.

use std::sync::Arc;

use tracing::debug;

use super::ChannelHandler;
use crate::Result;
use crate::error::MarkupError;
use crate::models::Channel;
use crate::models::orders::OrdersMessage;
use crate::orders::OrderProcessor;

/// Feeds order lifecycle updates for one portfolio into an
/// [`OrderProcessor`].
pub struct OrderUpdateHandler {
    products: Vec<String>,
    portfolio_id: String,
    processor: Arc<OrderProcessor>,
}

impl OrderUpdateHandler {
    pub fn new(
        products: Vec<String>,
        portfolio_id: impl Into<String>,
        processor: Arc<OrderProcessor>,
    ) -> Self {
        Self {
            products,
            portfolio_id: portfolio_id.into(),
            processor,
        }
    }

    pub fn processor(&self) -> &Arc<OrderProcessor> {
        &self.processor
    }
}

impl ChannelHandler for OrderUpdateHandler {
    fn channel_name(&self) -> &str {
        Channel::Orders.as_str()
    }

    fn product_ids(&self) -> &[String] {
        &self.products
    }

    fn portfolio_id(&self) -> Option<&str> {
        Some(&self.portfolio_id)
    }

    fn handle_message(&self, message: serde_json::Value) -> Result<()> {
        let message: OrdersMessage = serde_json::from_value(message)
            .map_err(|e| MarkupError::MalformedMessage(format!("orders frame: {e}")))?;

        let processed = self.processor.process(&message);
        debug!(
            sequence_num = message.sequence_num,
            events = message.events.len(),
            processed,
            "Processed orders frame"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use crate::fees::FeeStrategy;
    use crate::orders::{MemoryOrderStore, MetadataStore, OrderStore};
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn signature_includes_portfolio() {
        let processor = Arc::new(OrderProcessor::new(
            FeeStrategy::new(dec!(0.002)).unwrap(),
            Arc::new(MetadataStore::new()),
            Arc::new(MemoryOrderStore::new()),
        ));
        let handler = OrderUpdateHandler::new(vec!["BTC-USD".to_string()], "PF", processor);
        let credentials = Credentials::new("AK", "pass", "secret", "SVC");

        assert_eq!(
            handler.signature_message(&credentials, "42"),
            "ordersAKSVC42PFBTC-USD"
        );
        let request = handler.subscription_message(&credentials, "42", "sig");
        assert_eq!(request.portfolio_id.as_deref(), Some("PF"));
    }

    #[test]
    fn frames_reach_the_store() {
        let store = Arc::new(MemoryOrderStore::new());
        let processor = Arc::new(OrderProcessor::new(
            FeeStrategy::new(dec!(0.002)).unwrap(),
            Arc::new(MetadataStore::new()),
            store.clone(),
        ));
        let handler = OrderUpdateHandler::new(vec!["BTC-USD".to_string()], "PF", processor);

        handler
            .handle_message(json!({
                "channel": "orders",
                "sequence_num": 1,
                "timestamp": "2025-01-01T00:00:00Z",
                "events": [{"type": "snapshot", "orders": [{"order_id": "abc", "status": "OPEN"}]}]
            }))
            .unwrap();

        assert_eq!(store.get("abc").unwrap().unwrap().status, "OPEN");
    }
}
