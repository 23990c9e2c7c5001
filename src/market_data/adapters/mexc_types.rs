// Source: MEXC spot v3 websocket (spot@public.limit.depth.v3.api) and REST /api/v3
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WsDepthMessage {
    #[serde(default)]
    pub c: String, // channel
    pub d: WsDepth,
    pub s: String, // symbol
    #[serde(default)]
    pub t: i64, // event time, ms
}

#[derive(Debug, Deserialize)]
pub struct WsDepth {
    #[serde(default)]
    pub bids: Vec<WsLevel>,
    #[serde(default)]
    pub asks: Vec<WsLevel>,
    #[serde(default)]
    pub e: String, // event type
    #[serde(default)]
    pub r: String, // version
}

#[derive(Debug, Deserialize)]
pub struct WsLevel {
    pub p: String, // price string, e.g. "1234.56"
    pub v: String, // volume string, e.g. "0.01"
}

// Types for REST /api/v3/exchangeInfo
#[derive(Debug, Deserialize)]
pub struct ExchangeInfo {
    #[serde(default)]
    pub symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeSymbol {
    pub symbol: String,
    #[serde(default)]
    pub status: serde_json::Value,
    #[serde(rename = "isSpotTradingAllowed", default)]
    pub is_spot_trading_allowed: bool,
}

impl ExchangeSymbol {
    // MEXC reports "1" for tradable pairs; older payloads used "ENABLED"
    pub fn is_active(&self) -> bool {
        match &self.status {
            serde_json::Value::String(s) => s == "1" || s.eq_ignore_ascii_case("ENABLED"),
            serde_json::Value::Number(n) => n.as_i64() == Some(1),
            _ => false,
        }
    }

    pub fn is_tradable_spot(&self) -> bool {
        self.is_active() && self.is_spot_trading_allowed
    }
}

// Types for REST /api/v3/ticker/24hr?symbol=X
#[derive(Debug, Deserialize)]
pub struct Ticker24h {
    #[serde(default)]
    pub volume: String,
    #[serde(rename = "quoteVolume", default)]
    pub quote_volume: String,
}
