use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::SubscriberError;

pub type SubscriberId = u64;

/// One downstream consumer of serialized snapshots.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn send(&self, payload: &str) -> Result<(), SubscriberError>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
pub struct SubscriberSet {
    subscribers: RwLock<AHashMap<SubscriberId, Arc<dyn Subscriber>>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let total = {
            let mut subs = self.subscribers.write();
            subs.insert(id, subscriber);
            subs.len()
        };
        metrics::gauge!("scanner_subscribers").set(total as f64);
        info!(id, total, "Subscriber connected");
        id
    }

    pub fn remove(&self, id: SubscriberId) -> bool {
        let (removed, total) = {
            let mut subs = self.subscribers.write();
            (subs.remove(&id).is_some(), subs.len())
        };
        if removed {
            metrics::gauge!("scanner_subscribers").set(total as f64);
            debug!(id, total, "Subscriber removed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().contains_key(&id)
    }

    /// Deliver `payload` to every subscriber. A failed write drops that subscriber
    /// and never stops delivery to the rest.
    pub async fn broadcast(&self, payload: &str) -> BroadcastReport {
        // no lock is held across the writes below
        let targets: Vec<(SubscriberId, Arc<dyn Subscriber>)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, sub)| (*id, Arc::clone(sub)))
            .collect();

        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();
        for (id, sub) in targets {
            match sub.send(payload).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(id, error = %e, "Dropping subscriber after failed write");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            if self.remove(id) {
                report.dropped += 1;
            }
        }
        if report.dropped > 0 {
            metrics::counter!("scanner_subscribers_dropped_total").increment(report.dropped as u64);
        }
        report
    }
}
