use thiserror::Error;

/// Everything that can go wrong between the feed socket and a finished spread record.
///
/// Connection, subscription and read failures are absorbed by the reconnect loop,
/// decode failures skip a single frame and enrichment failures fall back to zero volume.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("subscription failed for {symbol}: {reason}")]
    Subscription { symbol: String, reason: String },

    #[error("feed read failed: {0}")]
    Read(String),

    #[error("undecodable feed message: {reason}")]
    Decode { reason: String },

    #[error("volume lookup failed for {symbol}: {reason}")]
    Enrichment { symbol: String, reason: String },
}

impl FeedError {
    /// True for the errors that invalidate the live connection.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            FeedError::Connection { .. } | FeedError::Subscription { .. } | FeedError::Read(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("directory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no active spot symbols returned by the directory")]
    NoSymbols,
}

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("subscriber write failed: {0}")]
    Write(String),

    #[error("subscriber is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
