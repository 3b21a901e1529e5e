use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub use crate::fees::order::FeeMetadata;

/// Pending fee holds keyed by venue order id.
///
/// Entries are added when a quote-denominated order is placed and removed
/// once the order reaches a terminal status.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: RwLock<HashMap<String, FeeMetadata>>,
}

impl MetadataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the hold for `order_id`, replacing any previous entry.
    pub fn insert(&self, order_id: impl Into<String>, metadata: FeeMetadata) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order_id.into(), metadata);
    }

    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<FeeMetadata> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_id)
            .copied()
    }

    /// Drops the hold for `order_id`, returning it if present.
    pub fn remove(&self, order_id: &str) -> Option<FeeMetadata> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(order_id)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
