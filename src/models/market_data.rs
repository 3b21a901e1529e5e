//! `l2_data` channel models.

use rust_decimal::Decimal;
use serde::Deserialize;

use super::lenient_decimal;
use crate::book::{LevelUpdate, Side};

/// A frame from the `l2_data` channel.
#[derive(Debug, Clone, Deserialize)]
pub struct L2DataMessage {
    pub channel: String,
    #[serde(default)]
    pub events: Vec<L2Event>,
}

/// A snapshot or update for one product.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Event {
    #[serde(rename = "type", default)]
    pub tpe: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub updates: Vec<L2Level>,
}

impl L2Event {
    pub fn is_snapshot(&self) -> bool {
        self.tpe == "snapshot"
    }

    /// Converts the raw levels into book updates, skipping entries with an
    /// unknown side or an unreadable price or size.
    pub fn level_updates(&self) -> Vec<LevelUpdate> {
        self.updates.iter().filter_map(L2Level::to_update).collect()
    }
}

/// One price level as sent by the venue.
#[derive(Debug, Clone, Deserialize)]
pub struct L2Level {
    #[serde(default)]
    pub side: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub px: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub qty: Option<Decimal>,
}

impl L2Level {
    pub fn to_update(&self) -> Option<LevelUpdate> {
        let side = Side::from_label(&self.side)?;
        Some(LevelUpdate::new(side, self.px?, self.qty?))
    }
}
