//! Core type definitions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{CoreError, CoreResult, DecodeError, DecodeResult};

/// Quote currencies recognised when splitting compact symbols like `BTCUSD`.
/// Longest first so `USDT` wins over `USD`.
const KNOWN_QUOTES: [&str; 6] = ["USDT", "USDC", "USD", "EUR", "BTC", "ETH"];

/// Price sources in a deployment: one push-based, two pull-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    Primary,
    SecondaryA,
    SecondaryB,
}

impl SourceId {
    pub const ALL: [SourceId; 3] = [SourceId::Primary, SourceId::SecondaryA, SourceId::SecondaryB];
    pub const SECONDARIES: [SourceId; 2] = [SourceId::SecondaryA, SourceId::SecondaryB];

    pub fn name(&self) -> &'static str {
        match self {
            SourceId::Primary => "primary",
            SourceId::SecondaryA => "secondary-a",
            SourceId::SecondaryB => "secondary-b",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, SourceId::Primary)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Canonical trading pair symbol, always `BASE/QUOTE` in upper case.
///
/// Adapters translate provider-native forms (`BTCUSD`, `BTC-USD`) into this
/// form before anything is written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TickerId(String);

impl TickerId {
    pub fn new(base: &str, quote: &str) -> CoreResult<Self> {
        let base = base.trim().to_ascii_uppercase();
        let quote = quote.trim().to_ascii_uppercase();

        let valid = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric());
        if !valid(&base) || !valid(&quote) {
            return Err(CoreError::InvalidTicker(format!("{}/{}", base, quote)));
        }

        Ok(Self(format!("{}/{}", base, quote)))
    }

    /// Parse the canonical `BASE/QUOTE` form
    pub fn parse(symbol: &str) -> CoreResult<Self> {
        match symbol.split_once('/') {
            Some((base, quote)) => Self::new(base, quote),
            None => Err(CoreError::InvalidTicker(symbol.to_string())),
        }
    }

    /// Parse a compact symbol such as `BTCUSD`
    pub fn from_compact(symbol: &str) -> DecodeResult<Self> {
        let upper = symbol.trim().to_ascii_uppercase();

        KNOWN_QUOTES
            .iter()
            .filter(|quote| upper.len() > quote.len() && upper.ends_with(*quote))
            .find_map(|quote| Self::new(&upper[..upper.len() - quote.len()], quote).ok())
            .ok_or_else(|| DecodeError::UnknownSymbol(symbol.to_string()))
    }

    /// Parse a dash-separated symbol such as `BTC-USD`
    pub fn from_dashed(symbol: &str) -> DecodeResult<Self> {
        symbol
            .split_once('-')
            .and_then(|(base, quote)| Self::new(base, quote).ok())
            .ok_or_else(|| DecodeError::UnknownSymbol(symbol.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn base(&self) -> &str {
        self.0.split_once('/').map(|(b, _)| b).unwrap_or(&self.0)
    }

    pub fn quote(&self) -> &str {
        self.0.split_once('/').map(|(_, q)| q).unwrap_or("")
    }

    /// `BTCUSD`
    pub fn compact(&self) -> String {
        format!("{}{}", self.base(), self.quote())
    }

    /// `BTC-USD`
    pub fn dashed(&self) -> String {
        format!("{}-{}", self.base(), self.quote())
    }
}

impl fmt::Display for TickerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl TryFrom<String> for TickerId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TickerId> for String {
    fn from(ticker: TickerId) -> Self {
        ticker.0
    }
}

/// Publisher identifier (the signing key of a component price)
pub type PublisherId = String;

/// One source's price for one ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    /// Per-publisher component prices; empty for aggregate-only sources
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: BTreeMap<PublisherId, Decimal>,
}

impl PriceQuote {
    pub fn try_new(price: Decimal) -> DecodeResult<Self> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(DecodeError::NegativePrice(price.to_string()));
        }
        Ok(Self {
            price,
            components: BTreeMap::new(),
        })
    }

    pub fn with_components(mut self, components: BTreeMap<PublisherId, Decimal>) -> Self {
        self.components = components;
        self
    }
}

/// Latest prices of one source, keyed by ticker
pub type PriceMap = BTreeMap<TickerId, PriceQuote>;

/// One merged, timestamped view across all sources. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub prices: BTreeMap<SourceId, PriceMap>,
}

impl Snapshot {
    pub fn source_prices(&self, source: SourceId) -> Option<&PriceMap> {
        self.prices.get(&source)
    }

    pub fn quote(&self, source: SourceId, ticker: &TickerId) -> Option<&PriceQuote> {
        self.prices.get(&source).and_then(|m| m.get(ticker))
    }

    pub fn price(&self, source: SourceId, ticker: &TickerId) -> Option<Decimal> {
        self.quote(source, ticker).map(|q| q.price)
    }

    /// Tickers reported by the primary source
    pub fn primary_tickers(&self) -> impl Iterator<Item = &TickerId> {
        self.prices
            .get(&SourceId::Primary)
            .into_iter()
            .flat_map(|m| m.keys())
    }
}
