// Shared traits + event for market data adapters

use async_trait::async_trait;

use crate::error::FeedResult;
use crate::market_data::order_book::Levels;

#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    // Full top-of-book snapshot for one symbol (already normalised)
    Snapshot {
        symbol: String,
        bids: Levels,
        asks: Levels,
        ts_ms: i64,
    },
    // Subscription acks, pongs and anything else that carries no book
    Control(String),
}

/// Venue-specific knowledge: where to connect, how to subscribe, how to read frames.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    type Connection: FeedConnection;

    fn url(&self) -> &str;

    async fn connect(&self) -> FeedResult<Self::Connection>;

    fn subscription_message(&self, symbol: &str) -> String;

    /// Application-level ping, for venues that drop quiet connections.
    fn keepalive_message(&self) -> Option<String> {
        None
    }

    fn decode(&self, raw: &str) -> FeedResult<MarketEvent>;
}

/// A live, exclusively owned connection handle.
#[async_trait]
pub trait FeedConnection: Send {
    async fn send_text(&mut self, text: String) -> FeedResult<()>;

    /// Next text frame. Transport failure or a close frame is a `FeedError::Read`.
    async fn next_text(&mut self) -> FeedResult<String>;

    async fn close(&mut self);
}

pub mod mexc;
pub mod mexc_types;
