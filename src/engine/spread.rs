use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, trace};

use crate::engine::types::{SpreadOutcome, SpreadRecord};
use crate::engine::volume::VolumeCache;
use crate::market_data::order_book::OrderBookSnapshot;

/// Percent spread over the bid and the absolute gap.
pub fn spread_of(best_bid: f64, best_ask: f64) -> (f64, f64) {
    let absolute_diff = best_ask - best_bid;
    ((absolute_diff / best_bid) * 100.0, absolute_diff)
}

/// Best bid/ask if the book can be priced at all.
pub fn top_of_book(snapshot: &OrderBookSnapshot) -> Option<(f64, f64)> {
    let bid = snapshot.best_bid()?.price;
    let ask = snapshot.best_ask()?.price;
    // unparseable prices arrive here as 0.0
    if bid <= 0.0 || ask <= 0.0 {
        return None;
    }
    Some((bid, ask))
}

#[derive(Clone, Default)]
pub struct SpreadEngine {
    volumes: Option<Arc<VolumeCache>>,
}

impl SpreadEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume_cache(volumes: Arc<VolumeCache>) -> Self {
        Self { volumes: Some(volumes) }
    }

    pub fn enriches(&self) -> bool {
        self.volumes.is_some()
    }

    /// Never waits on I/O: volume comes from the cache as last known (0 if none).
    #[instrument(level = "trace", skip(self, snapshot))]
    pub fn compute(&self, symbol: &str, snapshot: &OrderBookSnapshot, min_threshold: f64) -> SpreadOutcome {
        let Some((best_bid, best_ask)) = top_of_book(snapshot) else {
            debug!(
                symbol,
                bids = snapshot.bids.len(),
                asks = snapshot.asks.len(),
                "Book not computable"
            );
            return SpreadOutcome::NotComputable;
        };

        let (spread_percent, absolute_diff) = spread_of(best_bid, best_ask);
        trace!(symbol, best_bid, best_ask, spread_percent, "Computed spread");

        // Below-threshold records are dropped by the hub, no point refreshing their volume.
        let volume_24h = match &self.volumes {
            Some(cache) if spread_percent >= min_threshold => cache.lookup(symbol),
            _ => 0.0,
        };

        SpreadOutcome::Valid(SpreadRecord {
            symbol: symbol.to_string(),
            best_bid,
            best_ask,
            spread_percent,
            absolute_diff,
            volume_24h,
            last_update: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::order_book::{Levels, PriceLevel};
    use proptest::prelude::*;
    use smallvec::smallvec;
    use std::time::Duration;

    fn book(bid: Option<f64>, ask: Option<f64>) -> OrderBookSnapshot {
        let side = |p: Option<f64>| -> Levels {
            match p {
                Some(price) => smallvec![PriceLevel { price, volume: 1.0 }],
                None => Levels::new(),
            }
        };
        OrderBookSnapshot {
            symbol: "TESTUSDT".into(),
            bids: side(bid),
            asks: side(ask),
            received_at: Utc::now(),
        }
    }

    fn unwrap_valid(outcome: SpreadOutcome) -> SpreadRecord {
        match outcome {
            SpreadOutcome::Valid(r) => r,
            SpreadOutcome::NotComputable => panic!("expected a record"),
        }
    }

    #[test]
    fn test_reference_scenario() {
        let engine = SpreadEngine::new();
        let record = unwrap_valid(engine.compute("TESTUSDT", &book(Some(100.00), Some(100.50)), 0.3));
        assert!((record.spread_percent - 0.5).abs() < 1e-9);
        assert!((record.absolute_diff - 0.5).abs() < 1e-9);
        assert_eq!(record.best_bid, 100.0);
        assert_eq!(record.best_ask, 100.5);
        assert_eq!(record.volume_24h, 0.0);
    }

    #[test]
    fn test_empty_sides_not_computable() {
        let engine = SpreadEngine::new();
        assert_eq!(engine.compute("X", &book(None, Some(1.0)), 0.0), SpreadOutcome::NotComputable);
        assert_eq!(engine.compute("X", &book(Some(1.0), None), 0.0), SpreadOutcome::NotComputable);
        assert_eq!(engine.compute("X", &book(None, None), 0.0), SpreadOutcome::NotComputable);
    }

    #[test]
    fn test_zero_prices_not_computable() {
        let engine = SpreadEngine::new();
        assert_eq!(engine.compute("X", &book(Some(0.0), Some(1.0)), 0.0), SpreadOutcome::NotComputable);
        assert_eq!(engine.compute("X", &book(Some(1.0), Some(0.0)), 0.0), SpreadOutcome::NotComputable);
        assert_eq!(engine.compute("X", &book(Some(-2.0), Some(1.0)), 0.0), SpreadOutcome::NotComputable);
    }

    #[tokio::test]
    async fn test_enrichment_reads_cache_without_waiting() {
        let (cache, mut requests) = VolumeCache::new(Duration::from_secs(60), 8);
        let cache = Arc::new(cache);
        let engine = SpreadEngine::with_volume_cache(cache.clone());

        // nothing cached yet: record goes out with 0, refresh queued
        let first = unwrap_valid(engine.compute("X", &book(Some(100.0), Some(100.5)), 0.3));
        assert_eq!(first.volume_24h, 0.0);
        assert_eq!(requests.try_recv().unwrap(), "X");

        cache.store("X", 12_345.0);
        let kept = unwrap_valid(engine.compute("X", &book(Some(100.0), Some(100.5)), 0.3));
        assert_eq!(kept.volume_24h, 12_345.0);
    }

    #[tokio::test]
    async fn test_no_refresh_below_threshold() {
        let (cache, mut requests) = VolumeCache::new(Duration::from_secs(60), 8);
        let engine = SpreadEngine::with_volume_cache(Arc::new(cache));

        let below = unwrap_valid(engine.compute("X", &book(Some(100.0), Some(100.5)), 0.6));
        assert_eq!(below.volume_24h, 0.0);
        assert!(requests.try_recv().is_err());
    }

    proptest! {
        #[test]
        fn prop_spread_formula(bid in 1e-8f64..1e6, gap in 0.0f64..1e4) {
            let ask = bid + gap;
            let snapshot = book(Some(bid), Some(ask));
            let (b, a) = top_of_book(&snapshot).unwrap();
            let (pct, diff) = spread_of(b, a);
            let expected = (ask - bid) / bid * 100.0;
            prop_assert!((pct - expected).abs() <= 1e-9 * expected.abs().max(1.0));
            prop_assert!((diff - (ask - bid)).abs() <= 1e-9 * diff.abs().max(1.0));
        }

        #[test]
        fn prop_one_sided_never_priced(p in 0.0f64..1e6, bid_side in any::<bool>()) {
            let snapshot = if bid_side { book(Some(p), None) } else { book(None, Some(p)) };
            prop_assert!(top_of_book(&snapshot).is_none());
        }
    }
}
