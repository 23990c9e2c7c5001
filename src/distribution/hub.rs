use std::time::Duration;

use ahash::AHashMap;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, instrument, trace, warn};

use crate::engine::types::{DistributionSnapshot, SpreadRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Upserted,
    Removed,
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Emitted(usize),
    Empty,
    /// Outbound queue full; this tick's snapshot was thrown away.
    Dropped(usize),
    Closed,
}

/// Latest passing spread record per symbol, plus the outbound queue it is published on.
pub struct DistributionHub {
    records: RwLock<AHashMap<String, SpreadRecord>>,
    min_threshold: f64,
    outbound: mpsc::Sender<DistributionSnapshot>,
}

impl DistributionHub {
    pub fn new(min_threshold: f64, outbound: mpsc::Sender<DistributionSnapshot>) -> Self {
        Self {
            records: RwLock::new(AHashMap::new()),
            min_threshold,
            outbound,
        }
    }

    /// Hub plus the receiving end of a bounded outbound queue.
    pub fn with_queue(min_threshold: f64, capacity: usize) -> (Self, mpsc::Receiver<DistributionSnapshot>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(min_threshold, tx), rx)
    }

    pub fn min_threshold(&self) -> f64 {
        self.min_threshold
    }

    #[instrument(level = "trace", skip(self, record), fields(symbol = %record.symbol, spread = record.spread_percent))]
    pub fn accept(&self, record: SpreadRecord) -> Membership {
        let membership = if record.spread_percent >= self.min_threshold {
            self.records.write().insert(record.symbol.clone(), record);
            Membership::Upserted
        } else if self.records.write().remove(&record.symbol).is_some() {
            debug!(symbol = %record.symbol, spread = record.spread_percent, "Spread fell below threshold");
            Membership::Removed
        } else {
            Membership::Absent
        };
        trace!(?membership, "Accepted spread record");
        membership
    }

    /// Drop a symbol whose book can no longer be priced.
    pub fn discard(&self, symbol: &str) -> bool {
        let removed = self.records.write().remove(symbol).is_some();
        if removed {
            debug!(symbol, "Removed unpriceable symbol");
        }
        removed
    }

    /// Patch the volume of a live record in place; prices and `last_update` are untouched.
    pub fn update_volume(&self, symbol: &str, volume_24h: f64) -> bool {
        match self.records.write().get_mut(symbol) {
            Some(record) => {
                record.volume_24h = volume_24h;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<SpreadRecord> {
        self.records.read().get(symbol).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn snapshot(&self) -> DistributionSnapshot {
        // copy out under the read lock, sort after releasing it
        let records: Vec<SpreadRecord> = self.records.read().values().cloned().collect();
        DistributionSnapshot::ranked(records)
    }

    pub fn tick(&self) -> TickOutcome {
        let snapshot = self.snapshot();
        metrics::gauge!("scanner_live_records").set(snapshot.len() as f64);
        if snapshot.is_empty() {
            trace!("No live spreads, skipping emission");
            return TickOutcome::Empty;
        }

        let count = snapshot.len();
        match self.outbound.try_send(snapshot) {
            Ok(()) => {
                metrics::counter!("scanner_snapshots_emitted_total").increment(1);
                debug!(records = count, "Emitted distribution snapshot");
                TickOutcome::Emitted(count)
            }
            Err(TrySendError::Full(_)) => {
                metrics::counter!("scanner_snapshots_dropped_total").increment(1);
                warn!(records = count, "Outbound queue full, dropping snapshot");
                TickOutcome::Dropped(count)
            }
            Err(TrySendError::Closed(_)) => TickOutcome::Closed,
        }
    }

    /// Remove records older than `max_age`. A record exactly `max_age` old stays.
    pub fn evict_stale(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<String> {
        let max_age = TimeDelta::from_std(max_age).unwrap_or(TimeDelta::MAX);
        let mut evicted = Vec::new();
        self.records.write().retain(|symbol, record| {
            let fresh = now.signed_duration_since(record.last_update) <= max_age;
            if !fresh {
                evicted.push(symbol.clone());
            }
            fresh
        });

        if !evicted.is_empty() {
            evicted.sort();
            metrics::counter!("scanner_evictions_total").increment(evicted.len() as u64);
            info!(count = evicted.len(), symbols = ?evicted, "Evicted stale spreads");
        }
        evicted
    }
}
