//! Configuration types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::{CoreError, CoreResult, TickerId};

pub const DEFAULT_PAIRS: [&str; 4] = ["BTC/USD", "ETH/USD", "SOL/USD", "BNB/USD"];

/// Deployment environment of the primary feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Dev,
    Prod,
}

impl Environment {
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }

    pub fn primary_ws_url(&self) -> &'static str {
        match self {
            Environment::Local => "ws://localhost:3000/node/v1/data/subscribe",
            Environment::Dev => "wss://ws.dev.pragma.build/node/v1/data/subscribe",
            Environment::Prod => "wss://ws.pragma.build/node/v1/data/subscribe",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            other => Err(CoreError::InvalidConfig(format!("unknown environment `{}`", other))),
        }
    }
}

/// Streaming (push) feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryFeedConfig {
    pub enabled: bool,
    pub ws_url: String,
    pub reconnect_delay_ms: u64,
}

impl PrimaryFeedConfig {
    pub fn for_environment(env: Environment) -> Self {
        Self {
            enabled: true,
            ws_url: env.primary_ws_url().to_string(),
            reconnect_delay_ms: 5_000,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Polling (pull) feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingFeedConfig {
    pub enabled: bool,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl PollingFeedConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
            poll_interval_ms: 1_000,
            request_timeout_ms: 10_000,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Snapshot store and delivery queue sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Ring capacity of the history log; `None` keeps everything
    pub history_capacity: Option<NonZeroUsize>,
    /// Ring capacity of the arrival log; `None` keeps everything
    pub arrival_capacity: Option<NonZeroUsize>,
    pub event_queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            arrival_capacity: None,
            event_queue_capacity: 10_000,
        }
    }
}

/// Complete monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub environment: Environment,
    pub pairs: Vec<String>,
    pub primary: PrimaryFeedConfig,
    /// Pyth Hermes price service
    pub secondary_a: PollingFeedConfig,
    /// Extended exchange market info (Stork index prices)
    pub secondary_b: PollingFeedConfig,
    pub store: StoreConfig,
}

impl MonitorConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            pairs: DEFAULT_PAIRS.iter().map(|p| p.to_string()).collect(),
            primary: PrimaryFeedConfig::for_environment(environment),
            secondary_a: PollingFeedConfig::new("https://hermes.pyth.network"),
            secondary_b: PollingFeedConfig::new("https://api.extended.exchange"),
            store: StoreConfig::default(),
        }
    }

    /// Tracked pairs in canonical form
    pub fn tickers(&self) -> CoreResult<Vec<TickerId>> {
        self.pairs.iter().map(|p| TickerId::parse(p)).collect()
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.pairs.is_empty() {
            return Err(CoreError::InvalidConfig("no pairs configured".into()));
        }
        self.tickers()?;

        if self.primary.enabled && self.primary.ws_url.is_empty() {
            return Err(CoreError::InvalidConfig("primary ws_url is empty".into()));
        }

        for (name, feed) in [("secondary_a", &self.secondary_a), ("secondary_b", &self.secondary_b)] {
            if feed.enabled && feed.poll_interval_ms == 0 {
                return Err(CoreError::InvalidConfig(format!("{} poll_interval_ms must be > 0", name)));
            }
            if feed.enabled && feed.base_url.is_empty() {
                return Err(CoreError::InvalidConfig(format!("{} base_url is empty", name)));
            }
        }

        if !self.primary.enabled && !self.secondary_a.enabled && !self.secondary_b.enabled {
            return Err(CoreError::InvalidConfig("no feeds enabled".into()));
        }

        if self.store.event_queue_capacity == 0 {
            return Err(CoreError::InvalidConfig("event_queue_capacity must be > 0".into()));
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Local)
    }
}
