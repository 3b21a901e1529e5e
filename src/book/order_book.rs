use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError, RwLock};

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::trace;

use super::{LevelUpdate, OrderBookSnapshot, PriceLevel, Side};

/// Best bid and best ask as last published by the writer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopOfBook {
    pub bid: Option<PriceLevel>,
    pub ask: Option<PriceLevel>,
}

#[derive(Debug)]
struct Levels {
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
    sequence: u64,
    update_time: OffsetDateTime,
}

/// Level-2 book for one product.
///
/// Writers serialise on the level lock for the whole read-modify-write of
/// an event, so two deltas can never interleave. The top of book is copied
/// into its own lock at the end of each write.
#[derive(Debug)]
pub struct OrderBook {
    product: String,
    max_depth: usize,
    levels: Mutex<Levels>,
    top: RwLock<TopOfBook>,
}

impl OrderBook {
    /// An empty book keeping at most `max_depth` levels per side (`0`
    /// keeps everything).
    #[must_use]
    pub fn new(product: impl Into<String>, max_depth: usize) -> Self {
        Self {
            product: product.into(),
            max_depth,
            levels: Mutex::new(Levels {
                bids: Vec::new(),
                asks: Vec::new(),
                sequence: 0,
                update_time: OffsetDateTime::now_utc(),
            }),
            top: RwLock::new(TopOfBook::default()),
        }
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Replaces both sides with `updates`.
    ///
    /// Duplicate prices keep the last size seen and zero sizes are dropped.
    pub fn apply_snapshot(&self, updates: &[LevelUpdate]) {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);

        let mut bids = BTreeMap::new();
        let mut asks = BTreeMap::new();
        merge(&mut bids, &mut asks, updates);

        self.store(&mut levels, &bids, &asks);
        trace!(
            product = %self.product,
            bids = levels.bids.len(),
            asks = levels.asks.len(),
            "applied book snapshot"
        );
    }

    /// Merges `updates` into the current levels.
    ///
    /// A zero size removes the price; any other size replaces it. An empty
    /// slice leaves the levels untouched.
    pub fn apply_delta(&self, updates: &[LevelUpdate]) {
        if updates.is_empty() {
            return;
        }

        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);

        let mut bids: BTreeMap<Decimal, Decimal> =
            levels.bids.iter().map(|l| (l.price, l.size)).collect();
        let mut asks: BTreeMap<Decimal, Decimal> =
            levels.asks.iter().map(|l| (l.price, l.size)).collect();
        merge(&mut bids, &mut asks, updates);

        self.store(&mut levels, &bids, &asks);
    }

    /// Highest bid, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.top().bid
    }

    /// Lowest ask, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.top().ask
    }

    #[must_use]
    pub fn top(&self) -> TopOfBook {
        *self.top.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// The first `n` bids and asks.
    #[must_use]
    pub fn top_levels(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        (
            levels.bids.iter().take(n).copied().collect(),
            levels.asks.iter().take(n).copied().collect(),
        )
    }

    /// Deep copy of the current book.
    #[must_use]
    pub fn snapshot(&self) -> OrderBookSnapshot {
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        OrderBookSnapshot {
            product: self.product.clone(),
            bids: levels.bids.clone(),
            asks: levels.asks.clone(),
            sequence: levels.sequence,
            update_time: levels.update_time,
        }
    }

    fn store(
        &self,
        levels: &mut Levels,
        bids: &BTreeMap<Decimal, Decimal>,
        asks: &BTreeMap<Decimal, Decimal>,
    ) {
        let depth = if self.max_depth == 0 { usize::MAX } else { self.max_depth };

        levels.bids = bids
            .iter()
            .rev()
            .take(depth)
            .map(|(&price, &size)| PriceLevel::new(price, size))
            .collect();
        levels.asks = asks
            .iter()
            .take(depth)
            .map(|(&price, &size)| PriceLevel::new(price, size))
            .collect();
        levels.sequence += 1;
        levels.update_time = OffsetDateTime::now_utc();

        let mut top = self.top.write().unwrap_or_else(PoisonError::into_inner);
        *top = TopOfBook {
            bid: levels.bids.first().copied(),
            ask: levels.asks.first().copied(),
        };
    }
}

fn merge(
    bids: &mut BTreeMap<Decimal, Decimal>,
    asks: &mut BTreeMap<Decimal, Decimal>,
    updates: &[LevelUpdate],
) {
    for update in updates {
        let side = match update.side {
            Side::Bid => &mut *bids,
            Side::Ask => &mut *asks,
        };
        if update.size <= Decimal::ZERO {
            side.remove(&update.price);
        } else {
            side.insert(update.price, update.size);
        }
    }
}
