//! Per-product level-2 order books built from snapshot and delta events.
//!
//! Each [`OrderBook`] keeps its full level sequences behind a single writer
//! lock and separately publishes the top of book, so best-bid/best-ask
//! readers never wait on a rebuild. [`OrderBookStore`] owns one book per
//! product.

mod order_book;

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

pub use order_book::{OrderBook, TopOfBook};

/// A single price level: aggregate size resting at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl PriceLevel {
    #[must_use]
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Book side a level belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Classifies a venue side label.
    ///
    /// Labels starting with `bid` are bids; `ask` and `offer` are asks.
    /// Anything else is unrecognised.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label.starts_with("bid") {
            Some(Self::Bid)
        } else if label.starts_with("ask") || label.starts_with("off") {
            Some(Self::Ask)
        } else {
            None
        }
    }
}

/// One incoming level change. A size of zero removes the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelUpdate {
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

impl LevelUpdate {
    #[must_use]
    pub fn new(side: Side, price: Decimal, size: Decimal) -> Self {
        Self { side, price, size }
    }
}

/// Point-in-time copy of a book, safe to hand to unrelated readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBookSnapshot {
    pub product: String,
    /// Strictly descending by price.
    pub bids: Vec<PriceLevel>,
    /// Strictly ascending by price.
    pub asks: Vec<PriceLevel>,
    /// Number of events applied so far.
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub update_time: OffsetDateTime,
}

impl OrderBookSnapshot {
    /// Best ask minus best bid, when both sides are populated.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bids.first(), self.asks.first()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }
}

/// Owns one [`OrderBook`] per product.
#[derive(Debug)]
pub struct OrderBookStore {
    max_depth: usize,
    books: RwLock<HashMap<String, Arc<OrderBook>>>,
}

impl OrderBookStore {
    /// Creates an empty store whose books keep at most `max_depth` levels
    /// per side (`0` keeps everything).
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            books: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the book for `product`, creating an empty one if needed.
    pub fn get_or_create(&self, product: &str) -> Arc<OrderBook> {
        if let Some(book) = self.get(product) {
            return book;
        }

        let mut books = self.books.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            books
                .entry(product.to_string())
                .or_insert_with(|| Arc::new(OrderBook::new(product, self.max_depth))),
        )
    }

    /// Returns the book for `product` if one exists.
    #[must_use]
    pub fn get(&self, product: &str) -> Option<Arc<OrderBook>> {
        self.books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(product)
            .cloned()
    }

    /// Products with a book, sorted.
    #[must_use]
    pub fn products(&self) -> Vec<String> {
        let mut products: Vec<String> = self
            .books
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        products.sort();
        products
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}
