//! Order records and their audit trail.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::Result;
use crate::fees::SettlementResult;
use crate::fees::order::FeeMetadata;

/// Latest known state of one order, merged from venue updates and our own
/// fee bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub client_order_id: String,
    pub product_id: String,
    pub side: String,
    pub order_type: String,
    pub status: String,

    pub cum_qty: Decimal,
    pub leaves_qty: Decimal,
    pub avg_px: Decimal,
    pub net_avg_px: Decimal,
    pub fees: Decimal,
    pub commission: Decimal,
    pub venue_fee: Decimal,
    pub ces_commission: Decimal,

    pub metadata: FeeMetadata,
    pub settlement: SettlementResult,

    #[serde(with = "time::serde::rfc3339")]
    pub first_seen_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated_at: OffsetDateTime,
}

/// One raw update as received, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderEvent {
    /// Assigned by the store on append.
    pub id: u64,
    pub order_id: String,
    pub sequence_num: i64,
    /// `snapshot` or `update`.
    pub event_type: String,
    pub status: String,
    pub cum_qty: String,
    pub leaves_qty: String,
    pub avg_px: String,
    pub net_avg_px: String,
    pub fees: String,
    pub commission: String,
    pub venue_fee: String,
    pub ces_commission: String,
    pub raw_json: String,
    #[serde(with = "time::serde::rfc3339")]
    pub received_at: OffsetDateTime,
}

/// Persistence for order records and the append-only event log.
pub trait OrderStore: Send + Sync {
    /// Loads the current record for `order_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Store`](crate::MarkupError::Store) if the
    /// backend cannot be read.
    fn get(&self, order_id: &str) -> Result<Option<OrderRecord>>;

    /// Inserts or replaces a record. An existing record's `first_seen_at`
    /// survives the replacement.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Store`](crate::MarkupError::Store) if the
    /// write fails.
    fn upsert(&self, record: OrderRecord) -> Result<()>;

    /// Appends an audit event and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Store`](crate::MarkupError::Store) if the
    /// write fails.
    fn append_event(&self, event: OrderEvent) -> Result<u64>;

    /// Every event recorded for `order_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::Store`](crate::MarkupError::Store) if the
    /// backend cannot be read.
    fn events(&self, order_id: &str) -> Result<Vec<OrderEvent>>;
}

/// Audit events kept by [`MemoryOrderStore::new`].
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Process-local [`OrderStore`].
///
/// Records are kept for every order seen. The audit log is a ring: once it
/// holds `event_capacity` events the oldest is dropped on each append, and
/// ids keep counting up.
#[derive(Debug)]
pub struct MemoryOrderStore {
    records: Mutex<HashMap<String, OrderRecord>>,
    events: Mutex<EventLog>,
}

#[derive(Debug)]
struct EventLog {
    entries: VecDeque<OrderEvent>,
    capacity: usize,
    next_id: u64,
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose audit log keeps at most `capacity` events (minimum 1).
    #[must_use]
    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            events: Mutex::new(EventLog {
                entries: VecDeque::new(),
                capacity: capacity.max(1),
                next_id: 1,
            }),
        }
    }

    /// Number of distinct orders stored.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All records, ordered by first sighting.
    pub fn records(&self) -> Vec<OrderRecord> {
        let mut records: Vec<OrderRecord> = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        records
    }
}

impl OrderStore for MemoryOrderStore {
    fn get(&self, order_id: &str) -> Result<Option<OrderRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_id)
            .cloned())
    }

    fn upsert(&self, mut record: OrderRecord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = records.get(&record.order_id) {
            record.first_seen_at = existing.first_seen_at;
        }
        records.insert(record.order_id.clone(), record);
        Ok(())
    }

    fn append_event(&self, mut event: OrderEvent) -> Result<u64> {
        let mut log = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let id = log.next_id;
        log.next_id += 1;
        event.id = id;
        if log.entries.len() == log.capacity {
            log.entries.pop_front();
        }
        log.entries.push_back(event);
        Ok(id)
    }

    fn events(&self, order_id: &str) -> Result<Vec<OrderEvent>> {
        Ok(self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect())
    }
}
