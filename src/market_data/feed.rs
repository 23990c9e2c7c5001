// Connection state machine for the single upstream feed. FeedManager owns the
// handle; any send or read failure drops it, and the read loop decides when to retry.

use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::error::{FeedError, FeedResult};
use crate::market_data::adapters::{FeedConnection, FeedConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reading,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reading => "reading",
        };
        f.write_str(s)
    }
}

pub struct FeedManager<C: FeedConnector> {
    connector: C,
    conn: Option<C::Connection>,
    state: ConnectionState,
}

impl<C: FeedConnector> FeedManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            conn: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Single attempt, no retry. Any previous handle is closed and replaced.
    #[instrument(skip(self), fields(url = %self.connector.url()))]
    pub async fn connect(&mut self) -> FeedResult<()> {
        self.disconnect().await;
        self.state = ConnectionState::Connecting;
        match self.connector.connect().await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = ConnectionState::Connected;
                info!("Feed connected");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(e)
            }
        }
    }

    /// One subscription request per symbol. Stops at the first failed send and
    /// drops the connection; symbols already sent are not tracked.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn subscribe(&mut self, symbols: &[String]) -> FeedResult<()> {
        if self.conn.is_none() {
            return Err(FeedError::Subscription {
                symbol: symbols.first().cloned().unwrap_or_default(),
                reason: "not connected".to_string(),
            });
        }
        for symbol in symbols {
            let Some(conn) = self.conn.as_mut() else {
                break;
            };
            let msg = self.connector.subscription_message(symbol);
            debug!(symbol = %symbol, "Sending subscription");
            if let Err(e) = conn.send_text(msg).await {
                warn!(symbol = %symbol, error = %e, "Subscription send failed");
                self.disconnect().await;
                return Err(FeedError::Subscription {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                });
            }
        }
        info!(count = symbols.len(), "Subscribed to order books");
        Ok(())
    }

    pub async fn send_keepalive(&mut self) -> FeedResult<()> {
        let Some(msg) = self.connector.keepalive_message() else {
            return Ok(());
        };
        let Some(conn) = self.conn.as_mut() else {
            return Err(FeedError::Read("not connected".to_string()));
        };
        if let Err(e) = conn.send_text(msg).await {
            self.disconnect().await;
            return Err(e);
        }
        Ok(())
    }

    /// Next raw frame. Transport failures drop the connection; per-frame
    /// problems (`FeedError::Decode`) leave it up.
    pub async fn read_next(&mut self) -> FeedResult<String> {
        let Some(conn) = self.conn.as_mut() else {
            return Err(FeedError::Read("not connected".to_string()));
        };
        self.state = ConnectionState::Reading;
        match conn.next_text().await {
            Ok(text) => Ok(text),
            Err(e) => {
                if e.is_connection_fatal() {
                    self.disconnect().await;
                }
                Err(e)
            }
        }
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close().await;
            debug!("Feed connection closed");
        }
        self.state = ConnectionState::Disconnected;
    }
}
