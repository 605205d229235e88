//! Error types

use thiserror::Error;

use crate::SourceId;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid ticker: {0}")]
    InvalidTicker(String),
}

/// Per-field decode failures. Each one skips a single field or ticker,
/// never the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Empty input")]
    EmptyInput,

    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Non-ASCII byte content in short string")]
    NonAscii,

    #[error("Price digits `{0}` have no integer part")]
    MissingIntegerPart(String),

    #[error("Non-digit characters in price: {0}")]
    InvalidDigits(String),

    #[error("Negative price: {0}")]
    NegativePrice(String),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("Unrecognised symbol: {0}")]
    UnknownSymbol(String),

    #[error("Malformed entry: {0}")]
    MalformedEntry(String),
}

/// Price feed errors
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Feed disconnected")]
    Disconnected,

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Fetch from {feed} failed: {reason}")]
    FetchFailed { feed: SourceId, reason: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl FeedError {
    /// Transport-level failures trigger backoff and reconnect.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            FeedError::ConnectionFailed(_)
                | FeedError::SubscriptionFailed(_)
                | FeedError::Disconnected
        )
    }
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type DecodeResult<T> = Result<T, DecodeError>;
pub type FeedResult<T> = Result<T, FeedError>;
