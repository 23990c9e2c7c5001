// Runtime configuration. Layers, lowest precedence first: defaults, config file,
// SCANNER__* environment variables, CLI flags.

use std::time::Duration;

use config::{Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::market_data::adapters::mexc::{DEFAULT_DEPTH, DEFAULT_WS_URL};
use crate::market_data::directory::DEFAULT_REST_URL;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub feed: FeedConfig,
    pub spread: SpreadConfig,
    pub hub: HubConfig,
    pub server: ServerConfig,
    /// Static instrument list; when empty the directory is asked instead.
    pub symbols: Vec<String>,
    /// Prometheus listener, only used with the `metrics-exporter` feature.
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub ws_url: String,
    pub rest_url: String,
    pub depth: u32,
    pub reconnect_backoff_secs: u64,
    pub keepalive_secs: u64, // 0 disables
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            rest_url: DEFAULT_REST_URL.to_string(),
            depth: DEFAULT_DEPTH,
            reconnect_backoff_secs: 5,
            keepalive_secs: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    /// Minimum spread, in percent, for a record to be published.
    pub min_spread: f64,
    pub enrich_volume: bool,
    pub volume_cache_ttl_secs: u64,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            min_spread: 1.0,
            enrich_volume: true,
            volume_cache_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub emit_interval_ms: u64,
    pub eviction_interval_secs: u64,
    pub max_age_secs: u64,
    pub outbound_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            emit_interval_ms: 1_000,
            eviction_interval_secs: 60,
            max_age_secs: 300,
            outbound_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: "static".to_string(),
        }
    }
}

impl ScannerConfig {
    /// Load from `path` (required) or from an optional `config.*` in the working directory.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::with_name(p).required(true),
            None => File::with_name("config").required(false),
        };
        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("SCANNER")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: ScannerConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let cfg: ScannerConfig = config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.feed.ws_url.trim().is_empty() {
            return invalid("feed.ws_url must not be empty");
        }
        if self.feed.rest_url.trim().is_empty() {
            return invalid("feed.rest_url must not be empty");
        }
        if ![5, 10, 20].contains(&self.feed.depth) {
            return invalid("feed.depth must be 5, 10 or 20");
        }
        if self.feed.reconnect_backoff_secs == 0 {
            return invalid("feed.reconnect_backoff_secs must be positive");
        }
        if !self.spread.min_spread.is_finite() || self.spread.min_spread < 0.0 {
            return invalid("spread.min_spread must be a non-negative number");
        }
        if self.hub.emit_interval_ms == 0 || self.hub.eviction_interval_secs == 0 || self.hub.max_age_secs == 0 {
            return invalid("hub intervals must be positive");
        }
        if self.hub.outbound_capacity == 0 {
            return invalid("hub.outbound_capacity must be positive");
        }
        Ok(())
    }

    pub fn with_min_spread(mut self, min_spread: Option<f64>) -> Result<Self, ConfigError> {
        if let Some(v) = min_spread {
            self.spread.min_spread = v;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.feed.reconnect_backoff_secs)
    }

    pub fn keepalive(&self) -> Option<Duration> {
        (self.feed.keepalive_secs > 0).then(|| Duration::from_secs(self.feed.keepalive_secs))
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.hub.emit_interval_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.hub.eviction_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.hub.max_age_secs)
    }

    pub fn volume_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.spread.volume_cache_ttl_secs)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
