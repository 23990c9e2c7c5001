// End-to-end: scripted feed -> scanner tasks -> subscribers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use spread_scanner::config::ScannerConfig;
use spread_scanner::distribution::{Subscriber, SubscriberSet};
use spread_scanner::engine::VolumeSource;
use spread_scanner::error::{FeedError, FeedResult, SubscriberError};
use spread_scanner::market_data::adapters::mexc::{decode_frame, MexcConnector};
use spread_scanner::market_data::adapters::{FeedConnection, FeedConnector, MarketEvent};
use spread_scanner::pipeline::spawn_scanner;
use spread_scanner::shutdown;

/// Feed whose single connection yields whatever the test pushes into the channel.
struct ChannelConnector {
    frames: Mutex<Option<mpsc::Receiver<String>>>,
    sent: Arc<Mutex<Vec<String>>>,
    mexc: MexcConnector,
}

struct ChannelConnection {
    frames: mpsc::Receiver<String>,
    sent: Arc<Mutex<Vec<String>>>,
}

fn channel_feed() -> (mpsc::Sender<String>, ChannelConnector, Arc<Mutex<Vec<String>>>) {
    let (tx, rx) = mpsc::channel(64);
    let sent = Arc::new(Mutex::new(Vec::new()));
    let connector = ChannelConnector {
        frames: Mutex::new(Some(rx)),
        sent: sent.clone(),
        mexc: MexcConnector::default(),
    };
    (tx, connector, sent)
}

#[async_trait]
impl FeedConnector for ChannelConnector {
    type Connection = ChannelConnection;

    fn url(&self) -> &str {
        "test://feed"
    }

    async fn connect(&self) -> FeedResult<ChannelConnection> {
        let frames = self.frames.lock().take().ok_or_else(|| FeedError::Connection {
            url: "test://feed".into(),
            reason: "already used".into(),
        })?;
        Ok(ChannelConnection { frames, sent: self.sent.clone() })
    }

    fn subscription_message(&self, symbol: &str) -> String {
        self.mexc.subscription_message(symbol)
    }

    fn decode(&self, raw: &str) -> FeedResult<MarketEvent> {
        decode_frame(raw)
    }
}

#[async_trait]
impl FeedConnection for ChannelConnection {
    async fn send_text(&mut self, text: String) -> FeedResult<()> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn next_text(&mut self) -> FeedResult<String> {
        self.frames.recv().await.ok_or_else(|| FeedError::Read("feed closed".into()))
    }

    async fn close(&mut self) {}
}

#[derive(Default)]
struct Collecting {
    received: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Subscriber for Collecting {
    async fn send(&self, payload: &str) -> Result<(), SubscriberError> {
        if self.fail {
            return Err(SubscriberError::Closed);
        }
        self.received.lock().push(payload.to_string());
        Ok(())
    }
}

fn depth(symbol: &str, bid: &str, ask: &str) -> String {
    format!(
        r#"{{"c":"spot@public.limit.depth.v3.api@{symbol}@5","d":{{"bids":[{{"p":"{bid}","v":"3"}}],"asks":[{{"p":"{ask}","v":"2"}}]}},"s":"{symbol}","t":1700000000000}}"#
    )
}

fn test_config(min_spread: f64) -> ScannerConfig {
    let mut config = ScannerConfig::default();
    config.spread.min_spread = min_spread;
    config.spread.enrich_volume = false;
    config.feed.keepalive_secs = 0;
    config
}

fn last_snapshot(sub: &Collecting) -> Vec<serde_json::Value> {
    let received = sub.received.lock();
    let last = received.last().expect("no snapshot delivered");
    serde_json::from_str(last).unwrap()
}

#[tokio::test(start_paused = true)]
async fn spreads_flow_from_feed_to_subscriber() {
    let (frames, connector, sent) = channel_feed();
    let subscribers = Arc::new(SubscriberSet::new());
    let sink = Arc::new(Collecting::default());
    subscribers.register(sink.clone());
    let (trigger, _shutdown) = shutdown::channel();

    let scanner = spawn_scanner(
        connector,
        vec!["BTCUSDT".into(), "ETHUSDT".into()],
        &test_config(0.3),
        None,
        subscribers.clone(),
        &trigger,
    );

    frames.send(r#"{"id":0,"code":0,"msg":"spot@public.limit.depth.v3.api@BTCUSDT@5"}"#.into()).await.unwrap();
    frames.send(depth("BTCUSDT", "100.00", "100.50")).await.unwrap();
    frames.send(depth("ETHUSDT", "10.00", "10.02")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    assert_eq!(sent.lock().len(), 2);
    assert!(sent.lock()[0].contains("spot@public.limit.depth.v3.api@BTCUSDT@5"));

    // ETH at 0.2% stays below the 0.3% floor
    let snapshot = last_snapshot(&sink);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0]["Symbol"], "BTCUSDT");
    assert!((snapshot[0]["SpreadPercent"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert!((snapshot[0]["AbsoluteDiff"].as_f64().unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(snapshot[0]["Volume24h"].as_f64().unwrap(), 0.0);

    // BTC narrows out, ETH widens in
    frames.send(depth("BTCUSDT", "100.00", "100.10")).await.unwrap();
    frames.send(depth("ETHUSDT", "10.00", "10.50")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let snapshot = last_snapshot(&sink);
    let symbols: Vec<&str> = snapshot.iter().map(|r| r["Symbol"].as_str().unwrap()).collect();
    assert_eq!(symbols, vec!["ETHUSDT"]);
    assert!(scanner.hub.get("BTCUSDT").is_none());
    assert_eq!(scanner.books.len(), 2);

    trigger.trigger();
    scanner.join().await;
}

#[tokio::test(start_paused = true)]
async fn snapshots_are_ranked_widest_first() {
    let (frames, connector, _sent) = channel_feed();
    let subscribers = Arc::new(SubscriberSet::new());
    let sink = Arc::new(Collecting::default());
    subscribers.register(sink.clone());
    let (trigger, _shutdown) = shutdown::channel();

    let scanner = spawn_scanner(
        connector,
        vec!["A".into(), "B".into(), "C".into()],
        &test_config(0.0),
        None,
        subscribers,
        &trigger,
    );
    frames.send(depth("A", "100", "101")).await.unwrap();
    frames.send(depth("B", "100", "103")).await.unwrap();
    frames.send(depth("C", "100", "100.5")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    let symbols: Vec<String> = last_snapshot(&sink)
        .iter()
        .map(|r| r["Symbol"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(symbols, vec!["B", "A", "C"]);

    trigger.trigger();
    scanner.join().await;
}

#[tokio::test(start_paused = true)]
async fn failing_subscriber_is_dropped_others_keep_receiving() {
    let (frames, connector, _sent) = channel_feed();
    let subscribers = Arc::new(SubscriberSet::new());
    let first = Arc::new(Collecting::default());
    let broken = Arc::new(Collecting { fail: true, ..Default::default() });
    let second = Arc::new(Collecting::default());
    subscribers.register(first.clone());
    let broken_id = subscribers.register(broken);
    subscribers.register(second.clone());
    let (trigger, _shutdown) = shutdown::channel();

    let scanner = spawn_scanner(
        connector,
        vec!["BTCUSDT".into()],
        &test_config(0.3),
        None,
        subscribers.clone(),
        &trigger,
    );
    frames.send(depth("BTCUSDT", "100.00", "100.50")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_100)).await;

    assert_eq!(first.received.lock().len(), 1);
    assert_eq!(second.received.lock().len(), 1);
    assert_eq!(first.received.lock()[0], second.received.lock()[0]);
    assert!(!subscribers.contains(broken_id));
    assert_eq!(subscribers.len(), 2);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(first.received.lock().len(), 2);

    trigger.trigger();
    scanner.join().await;
}

#[tokio::test(start_paused = true)]
async fn nothing_is_emitted_while_no_spread_qualifies() {
    let (frames, connector, _sent) = channel_feed();
    let subscribers = Arc::new(SubscriberSet::new());
    let sink = Arc::new(Collecting::default());
    subscribers.register(sink.clone());
    let (trigger, _shutdown) = shutdown::channel();

    let scanner = spawn_scanner(
        connector,
        vec!["BTCUSDT".into()],
        &test_config(5.0),
        None,
        subscribers,
        &trigger,
    );
    frames.send(depth("BTCUSDT", "100.00", "100.50")).await.unwrap();
    frames.send(depth("BTCUSDT", "0", "100.50")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(sink.received.lock().is_empty());
    assert!(scanner.hub.is_empty());

    trigger.trigger();
    scanner.join().await;
}

/// REST side that hangs for `delay` and then fails.
struct HangingVolumes {
    delay: Duration,
}

#[async_trait]
impl VolumeSource for HangingVolumes {
    async fn volume_24h(&self, symbol: &str) -> FeedResult<f64> {
        tokio::time::sleep(self.delay).await;
        Err(FeedError::Enrichment { symbol: symbol.into(), reason: "upstream timeout".into() })
    }
}

#[tokio::test(start_paused = true)]
async fn volume_outage_does_not_stall_the_feed() {
    let (frames, connector, _sent) = channel_feed();
    let subscribers = Arc::new(SubscriberSet::new());
    let sink = Arc::new(Collecting::default());
    subscribers.register(sink.clone());
    let (trigger, _shutdown) = shutdown::channel();

    let mut config = test_config(0.3);
    config.spread.enrich_volume = true;
    let symbols: Vec<String> = (0..6).map(|i| format!("S{i}")).collect();
    let volumes: Arc<dyn VolumeSource> = Arc::new(HangingVolumes { delay: Duration::from_secs(10) });
    let scanner = spawn_scanner(
        connector,
        symbols.clone(),
        &config,
        Some(volumes),
        subscribers,
        &trigger,
    );

    for symbol in &symbols {
        frames.send(depth(symbol, "100.00", "102.00")).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    // every record is live within the first emission, volume not yet known
    assert_eq!(scanner.hub.len(), 6);
    let snapshot = last_snapshot(&sink);
    assert_eq!(snapshot.len(), 6);
    assert!(snapshot.iter().all(|r| r["Volume24h"].as_f64() == Some(0.0)));

    // later updates keep flowing while lookups are still hanging
    frames.send(depth("S0", "100.00", "105.00")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!((scanner.hub.get("S0").unwrap().spread_percent - 5.0).abs() < 1e-9);

    // shutdown is not held up by an in-flight lookup
    let started = tokio::time::Instant::now();
    trigger.trigger();
    scanner.join().await;
    assert!(started.elapsed() < Duration::from_secs(1));
}
