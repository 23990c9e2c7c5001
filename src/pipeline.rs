// Wires the feed loop, volume refresher, emitter, evictor and relay around one shared hub.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ScannerConfig;
use crate::distribution::hub::DistributionHub;
use crate::distribution::subscribers::SubscriberSet;
use crate::distribution::tasks::{run_emitter, run_evictor, run_relay, run_volume_refresher};
use crate::engine::spread::SpreadEngine;
use crate::engine::volume::{VolumeCache, VolumeSource};
use crate::market_data::adapters::FeedConnector;
use crate::market_data::feed::FeedManager;
use crate::market_data::order_book::OrderBookStore;
use crate::market_data::router::{run_feed_loop, FeedLoopSettings, SpreadPipeline};
use crate::shutdown::ShutdownTrigger;

const VOLUME_QUEUE_CAPACITY: usize = 1024;

/// Shared state of a running scanner plus its background tasks.
pub struct ScannerHandle {
    pub books: Arc<OrderBookStore>,
    pub hub: Arc<DistributionHub>,
    pub subscribers: Arc<SubscriberSet>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl ScannerHandle {
    /// Wait for every task; call after the shutdown trigger fired.
    pub async fn join(self) {
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "Background task ended abnormally");
            }
        }
        info!("Scanner tasks stopped");
    }
}

/// Start the scanner over `connector`. `volumes` enables 24h volume
/// enrichment: lookups run on their own task and are cached for the configured TTL.
pub fn spawn_scanner<C>(
    connector: C,
    symbols: Vec<String>,
    config: &ScannerConfig,
    volumes: Option<Arc<dyn VolumeSource>>,
    subscribers: Arc<SubscriberSet>,
    shutdown: &ShutdownTrigger,
) -> ScannerHandle
where
    C: FeedConnector + 'static,
{
    let books = Arc::new(OrderBookStore::new());
    let (hub, outbound) = DistributionHub::with_queue(config.spread.min_spread, config.hub.outbound_capacity);
    let hub = Arc::new(hub);

    let mut tasks = Vec::new();
    let engine = match volumes {
        Some(source) => {
            let (cache, requests) = VolumeCache::new(config.volume_cache_ttl(), VOLUME_QUEUE_CAPACITY);
            let cache = Arc::new(cache);
            tasks.push((
                "volumes",
                tokio::spawn(run_volume_refresher(
                    source,
                    cache.clone(),
                    requests,
                    hub.clone(),
                    shutdown.subscribe(),
                )),
            ));
            SpreadEngine::with_volume_cache(cache)
        }
        None => SpreadEngine::new(),
    };

    let settings = FeedLoopSettings {
        symbols,
        reconnect_backoff: config.reconnect_backoff(),
        keepalive: config.keepalive(),
    };
    info!(
        symbols = settings.symbols.len(),
        min_spread = config.spread.min_spread,
        enrich = engine.enriches(),
        "Starting scanner"
    );

    let pipeline = SpreadPipeline::new(books.clone(), engine, hub.clone());
    tasks.extend([
        (
            "feed",
            tokio::spawn(run_feed_loop(FeedManager::new(connector), pipeline, settings, shutdown.subscribe())),
        ),
        (
            "emitter",
            tokio::spawn(run_emitter(hub.clone(), config.emit_interval(), shutdown.subscribe())),
        ),
        (
            "evictor",
            tokio::spawn(run_evictor(
                hub.clone(),
                config.eviction_interval(),
                config.max_age(),
                shutdown.subscribe(),
            )),
        ),
        (
            "relay",
            tokio::spawn(run_relay(outbound, subscribers.clone(), shutdown.subscribe())),
        ),
    ]);

    ScannerHandle { books, hub, subscribers, tasks }
}
