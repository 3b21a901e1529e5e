//! Wire models for the prime brokerage WebSocket feed.
//!
//! Contains channel definitions, the signed subscription request and the
//! lenient amount parsing shared by the channel models.

pub mod market_data;
pub mod orders;

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Streaming channels this crate subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Level-2 order book (wire name: `"l2_data"`).
    L2Data,
    /// Order lifecycle updates for one portfolio.
    Orders,
}

impl Channel {
    /// Returns the wire-format channel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::L2Data => "l2_data",
            Channel::Orders => "orders",
        }
    }
}

/// A signed `subscribe` request.
///
/// `portfolio_id` is only sent on the orders channel.
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    #[serde(rename = "type")]
    pub tpe: String,
    pub channel: String,
    pub access_key: String,
    pub api_key_id: String,
    pub timestamp: String,
    pub passphrase: String,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<String>,
    pub product_ids: Vec<String>,
}

/// Routing fields present on every inbound frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub tpe: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Parses a venue amount given as a JSON string or number without going
/// through `f64`.
pub fn decimal_from_value(value: &serde_json::Value) -> Option<Decimal> {
    let raw = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

/// Deserializes an optional amount, mapping anything unreadable to `None`.
pub(crate) fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(decimal_from_value(&value))
}

/// Deserializes a string-or-number field as text, defaulting to `"0"` when
/// it is empty or null.
pub(crate) fn amount_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => zero_text(),
    })
}

pub(crate) fn zero_text() -> String {
    "0".to_string()
}
