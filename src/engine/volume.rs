// 24h volume enrichment: a non-blocking cache in front of a slow REST source.
// The feed loop only ever reads the cache; lookups run on the refresher task.

use std::time::Duration;

use ahash::{AHashMap, AHashSet};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use crate::error::FeedResult;

/// Auxiliary 24h statistics, keyed by symbol.
#[async_trait]
pub trait VolumeSource: Send + Sync {
    async fn volume_24h(&self, symbol: &str) -> FeedResult<f64>;
}

struct CachedVolume {
    fetched_at: Instant,
    volume: f64,
}

pub struct VolumeCache {
    ttl: Duration,
    entries: RwLock<AHashMap<String, CachedVolume>>,
    pending: Mutex<AHashSet<String>>,
    requests: mpsc::Sender<String>,
}

impl VolumeCache {
    /// Cache plus the refresh request queue the refresher task drains.
    pub fn new(ttl: Duration, queue_capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (requests, rx) = mpsc::channel(queue_capacity.max(1));
        let cache = Self {
            ttl,
            entries: RwLock::new(AHashMap::new()),
            pending: Mutex::new(AHashSet::new()),
            requests,
        };
        (cache, rx)
    }

    /// Last known volume, 0 if never fetched. Never waits: a missing or
    /// expired entry queues one refresh per symbol and returns immediately.
    pub fn lookup(&self, symbol: &str) -> f64 {
        let (volume, fresh) = match self.entries.read().get(symbol) {
            Some(entry) => (entry.volume, entry.fetched_at.elapsed() < self.ttl),
            None => (0.0, false),
        };
        if !fresh {
            self.request_refresh(symbol);
        }
        volume
    }

    fn request_refresh(&self, symbol: &str) {
        if !self.pending.lock().insert(symbol.to_string()) {
            return;
        }
        if self.requests.try_send(symbol.to_string()).is_err() {
            // full or closed: forget it, the next lookup asks again
            self.pending.lock().remove(symbol);
            trace!(symbol, "Volume refresh queue unavailable");
        }
    }

    /// Record a lookup result. Failures are stored as 0 and held for the TTL
    /// like any other value.
    pub fn store(&self, symbol: &str, volume: f64) {
        self.entries.write().insert(
            symbol.to_string(),
            CachedVolume { fetched_at: Instant::now(), volume },
        );
        self.pending.lock().remove(symbol);
    }

    pub fn is_pending(&self, symbol: &str) -> bool {
        self.pending.lock().contains(symbol)
    }
}
