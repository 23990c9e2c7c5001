// Router orchestrates adapter + book + spread engine + hub.
// The read loop here is the only writer into the order book store and the
// only producer of spread records.
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::distribution::hub::{DistributionHub, Membership};
use crate::engine::spread::SpreadEngine;
use crate::engine::types::SpreadOutcome;
use crate::error::FeedResult;
use crate::market_data::adapters::{FeedConnector, MarketEvent};
use crate::market_data::feed::FeedManager;
use crate::market_data::order_book::OrderBookStore;
use crate::shutdown::Shutdown;

pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct FeedLoopSettings {
    pub symbols: Vec<String>,
    pub reconnect_backoff: Duration,
    pub keepalive: Option<Duration>,
}

impl FeedLoopSettings {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            keepalive: None,
        }
    }
}

/// Book store → spread engine → hub, applied to one decoded event at a time.
pub struct SpreadPipeline {
    pub books: Arc<OrderBookStore>,
    pub engine: SpreadEngine,
    pub hub: Arc<DistributionHub>,
}

impl SpreadPipeline {
    pub fn new(books: Arc<OrderBookStore>, engine: SpreadEngine, hub: Arc<DistributionHub>) -> Self {
        Self { books, engine, hub }
    }

    pub fn handle_event(&self, event: MarketEvent) -> Option<Membership> {
        match event {
            MarketEvent::Snapshot { symbol, bids, asks, ts_ms } => {
                let received_at = event_time(ts_ms);
                let book = self.books.apply_update(&symbol, bids, asks, received_at);
                let membership = match self.engine.compute(&symbol, &book, self.hub.min_threshold()) {
                    SpreadOutcome::Valid(record) => self.hub.accept(record),
                    SpreadOutcome::NotComputable => {
                        if self.hub.discard(&symbol) {
                            Membership::Removed
                        } else {
                            Membership::Absent
                        }
                    }
                };
                Some(membership)
            }
            MarketEvent::Control(msg) => {
                debug!(msg = %msg, "Control frame");
                None
            }
        }
    }
}

fn event_time(ts_ms: i64) -> DateTime<Utc> {
    if ts_ms > 0 {
        DateTime::from_timestamp_millis(ts_ms).unwrap_or_else(Utc::now)
    } else {
        Utc::now()
    }
}

async fn establish<C: FeedConnector>(feed: &mut FeedManager<C>, symbols: &[String]) -> FeedResult<()> {
    feed.connect().await?;
    if let Err(e) = feed.subscribe(symbols).await {
        // a half-subscribed connection is not trusted; start over
        feed.disconnect().await;
        return Err(e);
    }
    Ok(())
}

/// Drive the feed until shutdown: connect, subscribe, read, and after any
/// transport failure wait `reconnect_backoff` and start over. Never gives up.
pub async fn run_feed_loop<C: FeedConnector>(
    mut feed: FeedManager<C>,
    pipeline: SpreadPipeline,
    settings: FeedLoopSettings,
    mut shutdown: Shutdown,
) {
    let backoff = settings.reconnect_backoff;
    let mut keepalive = interval(settings.keepalive.unwrap_or(Duration::from_secs(3600)));
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let keepalive_enabled = settings.keepalive.is_some();

    info!(symbols = settings.symbols.len(), backoff_s = backoff.as_secs(), "Feed loop started");
    loop {
        if shutdown.is_triggered() {
            break;
        }

        if !feed.is_connected() {
            let established = tokio::select! {
                _ = shutdown.wait() => break,
                result = establish(&mut feed, &settings.symbols) => result,
            };
            if let Err(e) = established {
                metrics::counter!("scanner_reconnect_attempts_total").increment(1);
                warn!(error = %e, backoff_s = backoff.as_secs(), "Feed unavailable, retrying after backoff");
                if !shutdown.sleep(backoff).await {
                    break;
                }
                continue;
            }
            keepalive.reset();
        }

        tokio::select! {
            _ = shutdown.wait() => break,
            _ = keepalive.tick(), if keepalive_enabled => {
                if let Err(e) = feed.send_keepalive().await {
                    warn!(error = %e, backoff_s = backoff.as_secs(), "Keepalive failed, reconnecting after backoff");
                    if !shutdown.sleep(backoff).await {
                        break;
                    }
                }
            }
            frame = feed.read_next() => match frame {
                Ok(raw) => {
                    metrics::counter!("scanner_feed_messages_total").increment(1);
                    match feed.connector().decode(&raw) {
                        Ok(event) => {
                            let membership = pipeline.handle_event(event);
                            trace!(?membership, "Frame applied");
                        }
                        Err(e) => {
                            metrics::counter!("scanner_decode_errors_total").increment(1);
                            warn!(error = %e, "Skipping undecodable frame");
                        }
                    }
                }
                Err(e) if e.is_connection_fatal() => {
                    warn!(error = %e, state = %feed.state(), backoff_s = backoff.as_secs(), "Feed read failed, reconnecting after backoff");
                    if !shutdown.sleep(backoff).await {
                        break;
                    }
                }
                Err(e) => {
                    metrics::counter!("scanner_decode_errors_total").increment(1);
                    warn!(error = %e, "Skipping unreadable frame");
                }
            },
        }
    }

    feed.disconnect().await;
    info!("Feed loop stopped");
}
