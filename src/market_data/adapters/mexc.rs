// MEXC spot adapter: websocket depth stream over tokio-tungstenite

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace};

use super::mexc_types::WsDepthMessage;
use super::{FeedConnection, FeedConnector, MarketEvent};
use crate::error::{FeedError, FeedResult};
use crate::market_data::normaliser::norm_side;

pub const DEFAULT_WS_URL: &str = "wss://wbs.mexc.com/ws";
pub const DEFAULT_DEPTH: u32 = 5;

pub struct MexcConnector {
    pub ws_url: String, // "wss://wbs.mexc.com/ws"
    pub depth: u32,     // 5, 10 or 20 levels
}

impl MexcConnector {
    pub fn new(ws_url: &str, depth: u32) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            depth,
        }
    }
}

impl Default for MexcConnector {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL, DEFAULT_DEPTH)
    }
}

pub struct MexcConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl FeedConnector for MexcConnector {
    type Connection = MexcConnection;

    fn url(&self) -> &str {
        &self.ws_url
    }

    async fn connect(&self) -> FeedResult<MexcConnection> {
        let (stream, response) = connect_async(self.ws_url.as_str())
            .await
            .map_err(|e| FeedError::Connection {
                url: self.ws_url.clone(),
                reason: e.to_string(),
            })?;
        info!(url = %self.ws_url, status = %response.status(), "Websocket connected");
        Ok(MexcConnection { stream })
    }

    fn subscription_message(&self, symbol: &str) -> String {
        serde_json::json!({
            "method": "SUBSCRIPTION",
            "params": [format!("spot@public.limit.depth.v3.api@{}@{}", symbol, self.depth)],
        })
        .to_string()
    }

    fn keepalive_message(&self) -> Option<String> {
        Some(serde_json::json!({ "method": "PING" }).to_string())
    }

    fn decode(&self, raw: &str) -> FeedResult<MarketEvent> {
        decode_frame(raw)
    }
}

/// Turn one websocket text frame into a market event.
pub fn decode_frame(raw: &str) -> FeedResult<MarketEvent> {
    let value: Value = serde_json::from_str(raw).map_err(|e| decode_error(&e, raw))?;

    // acks look like {"id":0,"code":0,"msg":"spot@public.limit.depth.v3.api@BTCUSDT@5"}
    if value.get("d").is_none() {
        if let Some(msg) = value.get("msg").and_then(Value::as_str) {
            return Ok(MarketEvent::Control(msg.to_string()));
        }
    }

    let msg: WsDepthMessage = serde_json::from_value(value).map_err(|e| decode_error(&e, raw))?;
    if msg.s.is_empty() {
        return Err(FeedError::Decode {
            reason: format!("empty symbol in {}", excerpt(raw)),
        });
    }
    trace!(channel = %msg.c, event = %msg.d.e, version = %msg.d.r, "Decoded depth frame");

    let bids = norm_side(msg.d.bids.iter().map(|l| (l.p.as_str(), l.v.as_str())));
    let asks = norm_side(msg.d.asks.iter().map(|l| (l.p.as_str(), l.v.as_str())));
    Ok(MarketEvent::Snapshot {
        symbol: msg.s,
        bids,
        asks,
        ts_ms: msg.t,
    })
}

fn decode_error(e: &serde_json::Error, raw: &str) -> FeedError {
    FeedError::Decode {
        reason: format!("{e}; frame: {}", excerpt(raw)),
    }
}

fn excerpt(raw: &str) -> &str {
    match raw.char_indices().nth(200) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[async_trait::async_trait]
impl FeedConnection for MexcConnection {
    async fn send_text(&mut self, text: String) -> FeedResult<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| FeedError::Read(e.to_string()))
    }

    async fn next_text(&mut self) -> FeedResult<String> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text),
                Some(Ok(Message::Binary(bin))) => {
                    return Err(FeedError::Decode {
                        reason: format!("unexpected binary frame ({} bytes)", bin.len()),
                    })
                }
                // tungstenite answers pings on its own
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => continue,
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Websocket closed by server");
                    return Err(FeedError::Read(format!("closed by server: {frame:?}")));
                }
                Some(Err(e)) => return Err(FeedError::Read(e.to_string())),
                None => return Err(FeedError::Read("stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "Error while closing websocket");
        }
    }
}
