//! `orders` channel models.

use serde::{Deserialize, Deserializer};

use super::{amount_text, zero_text};

/// A frame from the `orders` channel.
///
/// Orders are kept as raw JSON so the untouched payload can be written to
/// the audit log; use [`OrderUpdate::from_value`] to read the fields.
#[derive(Debug, Clone, Deserialize)]
pub struct OrdersMessage {
    pub channel: String,
    #[serde(default, deserialize_with = "lenient_sequence")]
    pub sequence_num: i64,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub events: Vec<OrdersEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrdersEvent {
    #[serde(rename = "type", default)]
    pub tpe: String,
    #[serde(default)]
    pub orders: Vec<serde_json::Value>,
}

/// Fields of one order as reported by the venue. Amounts stay textual;
/// missing ones read as `"0"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderUpdate {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub order_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub cum_qty: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub leaves_qty: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub avg_px: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub net_avg_px: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub fees: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub commission: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub venue_fee: String,
    #[serde(default = "zero_text", deserialize_with = "amount_text")]
    pub ces_commission: String,
}

impl OrderUpdate {
    /// Reads an order object from the `orders` array.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Json`](crate::MarkupError::Json) if `value` is
    /// not an object.
    pub fn from_value(value: &serde_json::Value) -> crate::Result<Self> {
        Ok(Self::deserialize(value)?)
    }
}

/// Sequence numbers arrive as integers, floats or strings; anything else
/// reads as zero.
fn lenient_sequence<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}
