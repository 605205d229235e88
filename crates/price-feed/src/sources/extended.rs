//! Extended exchange market info (Stork-backed index prices)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

use feedbench_core::{
    decode_decimal, FeedResult, PollingFeedConfig, PriceMap, PriceQuote, SourceId, TickerId,
};

use super::{get_json, http_client};
use crate::polling::PriceSource;

#[derive(Debug, Deserialize)]
pub struct MarketsResponse {
    pub data: Option<Vec<MarketInfo>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    pub name: String,
    pub market_stats: Option<MarketStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStats {
    pub index_price: Option<String>,
    pub mark_price: Option<String>,
}

pub struct ExtendedSource {
    client: Client,
    base_url: String,
    markets: HashSet<String>,
}

impl ExtendedSource {
    pub fn new(config: &PollingFeedConfig, tickers: &[TickerId]) -> FeedResult<Self> {
        Ok(Self::with_client(http_client(config)?, &config.base_url, tickers))
    }

    pub fn with_client(client: Client, base_url: &str, tickers: &[TickerId]) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            markets: tickers.iter().map(TickerId::dashed).collect(),
        }
    }

    /// Index price of every tracked market that also reports a mark price
    pub fn parse_response(&self, response: MarketsResponse) -> PriceMap {
        let mut prices = PriceMap::new();

        for market in response.data.unwrap_or_default() {
            if !self.markets.contains(&market.name) {
                continue;
            }
            let Some(stats) = market.market_stats else {
                continue;
            };
            if stats.mark_price.is_none() {
                continue;
            }
            let Some(index_price) = stats.index_price.as_deref() else {
                continue;
            };

            let decoded = TickerId::from_dashed(&market.name).and_then(|ticker| {
                let price = decode_decimal(index_price)?;
                Ok((ticker, PriceQuote::try_new(price)?))
            });

            match decoded {
                Ok((ticker, quote)) => {
                    prices.insert(ticker, quote);
                }
                Err(e) => debug!("Skipping market {}: {}", market.name, e),
            }
        }

        prices
    }
}

#[async_trait]
impl PriceSource for ExtendedSource {
    fn provider(&self) -> &str {
        "extended"
    }

    async fn fetch(&self) -> FeedResult<PriceMap> {
        let url = format!("{}/api/v1/info/markets", self.base_url);
        let response: MarketsResponse =
            get_json(&self.client, SourceId::SecondaryB, &url, &[]).await?;
        Ok(self.parse_response(response))
    }
}
