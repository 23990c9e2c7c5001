// REST side of the venue: the instrument list (once, at startup) and 24h volume.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::engine::volume::VolumeSource;
use crate::error::{DirectoryError, FeedError, FeedResult};
use crate::market_data::adapters::mexc_types::{ExchangeInfo, Ticker24h};
use crate::market_data::normaliser::parse_decimal;

pub const DEFAULT_REST_URL: &str = "https://api.mexc.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct MexcDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl MexcDirectory {
    pub fn new(base_url: &str) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("spread-scanner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Active, spot-tradable symbols. An empty list is an error: there is nothing to watch.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn tradable_symbols(&self) -> Result<Vec<String>, DirectoryError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let res = self.client.get(&url).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let info: ExchangeInfo = res.json().await?;
        let total = info.symbols.len();
        let symbols = tradable(info);
        if symbols.is_empty() {
            return Err(DirectoryError::NoSymbols);
        }
        info!(total, tradable = symbols.len(), "Fetched instrument directory");
        Ok(symbols)
    }

    pub async fn ticker_24h(&self, symbol: &str) -> Result<Ticker24h, DirectoryError> {
        let url = format!("{}/api/v3/ticker/24hr", self.base_url);
        let res = self.client.get(&url).query(&[("symbol", symbol)]).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(res.json().await?)
    }
}

pub fn tradable(info: ExchangeInfo) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.is_tradable_spot())
        .map(|s| s.symbol)
        .collect()
}

#[async_trait]
impl VolumeSource for MexcDirectory {
    async fn volume_24h(&self, symbol: &str) -> FeedResult<f64> {
        let ticker = self.ticker_24h(symbol).await.map_err(|e| FeedError::Enrichment {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })?;
        // quote volume is in the quote currency (USDT for most pairs)
        let volume = parse_decimal(&ticker.quote_volume);
        debug!(symbol, volume, base_volume = %ticker.volume, "Fetched 24h volume");
        Ok(volume)
    }
}
