use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub volume: f64,
}

// The feed sends 5/10/20 levels; 20 stays inline.
pub type Levels = SmallVec<[PriceLevel; 20]>;

/// Top-of-book view of one instrument, exactly as the last update delivered it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Levels, // highest price first
    pub asks: Levels, // lowest price first
    pub received_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Both sides populated; says nothing about whether the prices are sane.
    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

/// Latest snapshot per symbol. Only the feed loop writes here.
#[derive(Debug, Default)]
pub struct OrderBookStore {
    books: RwLock<AHashMap<String, Arc<OrderBookSnapshot>>>,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Replace the whole book with a fresh snapshot
    pub fn apply_update(
        &self,
        symbol: &str,
        bids: Levels,
        asks: Levels,
        received_at: DateTime<Utc>,
    ) -> Arc<OrderBookSnapshot> {
        let snapshot = Arc::new(OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids,
            asks,
            received_at,
        });
        trace!(
            symbol,
            bids = snapshot.bids.len(),
            asks = snapshot.asks.len(),
            "Replaced order book"
        );
        self.books.write().insert(symbol.to_string(), Arc::clone(&snapshot));
        snapshot
    }

    pub fn get(&self, symbol: &str) -> Option<Arc<OrderBookSnapshot>> {
        self.books.read().get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.books.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }
}
