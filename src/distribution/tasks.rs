// Timer-driven background tasks around the hub. Each one exits at its next
// suspension point once shutdown fires.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::distribution::hub::{DistributionHub, TickOutcome};
use crate::distribution::subscribers::SubscriberSet;
use crate::engine::types::DistributionSnapshot;
use crate::engine::volume::{VolumeCache, VolumeSource};
use crate::shutdown::Shutdown;

pub async fn run_emitter(hub: Arc<DistributionHub>, period: Duration, mut shutdown: Shutdown) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // first tick is immediate

    info!(period_ms = period.as_millis() as u64, "Snapshot emitter started");
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                if hub.tick() == TickOutcome::Closed {
                    info!("Outbound queue closed");
                    break;
                }
            }
        }
    }
    info!("Snapshot emitter stopped");
}

pub async fn run_evictor(hub: Arc<DistributionHub>, period: Duration, max_age: Duration, mut shutdown: Shutdown) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    info!(period_s = period.as_secs(), max_age_s = max_age.as_secs(), "Stale-record evictor started");
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                let evicted = hub.evict_stale(Utc::now(), max_age);
                trace!(evicted = evicted.len(), remaining = hub.len(), "Eviction pass");
            }
        }
    }
    info!("Stale-record evictor stopped");
}

/// Drains the outbound queue and fans each snapshot out as one JSON array.
pub async fn run_relay(
    mut snapshots: mpsc::Receiver<DistributionSnapshot>,
    subscribers: Arc<SubscriberSet>,
    mut shutdown: Shutdown,
) {
    loop {
        let snapshot = tokio::select! {
            _ = shutdown.wait() => break,
            next = snapshots.recv() => match next {
                Some(snapshot) => snapshot,
                None => break,
            },
        };

        if subscribers.is_empty() {
            trace!(records = snapshot.len(), "No subscribers, snapshot discarded");
            continue;
        }

        let payload = match snapshot.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to serialize snapshot");
                continue;
            }
        };
        let report = subscribers.broadcast(&payload).await;
        debug!(records = snapshot.len(), delivered = report.delivered, dropped = report.dropped, "Snapshot relayed");
    }
    info!("Snapshot relay stopped");
}

/// Serves the volume cache's refresh queue one symbol at a time, off the feed path.
/// A failed lookup is cached as 0; live records get only their volume patched.
pub async fn run_volume_refresher(
    source: Arc<dyn VolumeSource>,
    cache: Arc<VolumeCache>,
    mut requests: mpsc::Receiver<String>,
    hub: Arc<DistributionHub>,
    mut shutdown: Shutdown,
) {
    info!("Volume refresher started");
    loop {
        let symbol = tokio::select! {
            _ = shutdown.wait() => break,
            next = requests.recv() => match next {
                Some(symbol) => symbol,
                None => break,
            },
        };

        let fetched = tokio::select! {
            _ = shutdown.wait() => break,
            result = source.volume_24h(&symbol) => result,
        };
        let volume = match fetched {
            Ok(volume) => volume,
            Err(e) => {
                metrics::counter!("scanner_enrichment_errors_total").increment(1);
                warn!(symbol = %symbol, error = %e, "Volume enrichment failed, using 0");
                0.0
            }
        };
        cache.store(&symbol, volume);
        let live = hub.update_volume(&symbol, volume);
        trace!(symbol = %symbol, volume, live, "Volume refreshed");
    }
    info!("Volume refresher stopped");
}
