//! Pyth Hermes latest-price endpoint

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use feedbench_core::{
    decode_scaled, DecodeError, DecodeResult, FeedResult, PollingFeedConfig, PriceMap, PriceQuote,
    SourceId, TickerId,
};

use super::{get_json, http_client};
use crate::polling::PriceSource;

/// Hermes price feed ids and the compact pair each one quotes
pub const KNOWN_FEEDS: &[(&str, &str)] = &[
    ("e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43", "BTCUSD"),
    ("ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace", "ETHUSD"),
    ("ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d", "SOLUSD"),
    ("2f95862b045670cd22bee3114c39763a4a08beeb663b145d283c31d7d1101c4f", "BNBUSD"),
    ("6e3f3fa8253588df9326580180233eb791e03b443a3ba7a1d892e73874e19a54", "LTCUSD"),
    ("8ac0c70fff57e9aefdf5edf44b51d62c2d433653cbb2cf5cc06bb115af04d221", "LINKUSD"),
    ("93da3352f9f1d105fdfe4971cfa80e9dd777bfc5d0f683ebb6e1294b92137bb7", "AVAXUSD"),
    ("ffd11c5a1cfd42f80afb2df4d9f264c15f956d68153335374ec10722edd70472", "POLUSD"),
    ("ec5d399846a9209f3fe5881d70aae9268c94339ff9817e8d18ff19fa05eea1c8", "XRPUSD"),
    ("dcef50dd0a4cd2dcc17e45df1676dcb336a11a61c69df7a0299b0150c672d25c", "DOGEUSD"),
    ("d69731a2e74ac1ce884fc3890f7ee324b6deb66147055249568869ed700882e4", "PEPEUSD"),
    ("2b9ab1e972a281585084148ba1389800799bd4be63b957507db1349314e47445", "AAVEUSD"),
    ("67aed5a24fdad045475e7195c98a98aea119c763f272d4523f5bac93a4f33c2b", "TRXUSD"),
    ("23d7315113f5b1d3ba7a83604c44b94d79f4fd69af77f804fc7f920a6dc65744", "SUIUSD"),
    ("4ca4beeca86f0d164160323817a4e42b10010a724c2217c6ee41b54cd4cc61fc", "WIFUSD"),
    ("09f7c1d7dfbb7df2b8fe3d3d87ee94a2259d212da4f30c1f0540d066dfa44723", "TIAUSD"),
    ("8963217838ab4cf5cadc172203c1f0b763fbaa45f346d8ee50ba994bbcac3026", "TONUSD"),
    ("c63e2a7f37a04e5e614c07238bedb25dcc38927fba8fe890597a593c0b2fa4ad", "LDOUSD"),
    ("3fa4252848f9f0a1480be62745a4629d9eb1322aebab8a791e344b3b9c1adcf5", "ARBUSD"),
    ("385f64d993f7b77d8182ed5003d97c60aa3361f3cecfe711544d2d59165e9bdf", "OPUSD"),
    ("193c739db502aadcef37c2589738b1e37bdb257d58cf1ab3c7ebc8e6df4e3ec0", "ORDIUSD"),
    ("b43660a5f790c69354b0729a5ef9d50d68f1df92107540210b9cccba1f947cc2", "JTOUSD"),
    ("0a0408d619e9380abad35060f9192039ed5042fa6f82301d0e48bb52be830996", "JUPUSD"),
    ("78d185a741d07edb3412b09008b7c5cfb9bbbd7d568bf00ba737b456ba171501", "UNIUSD"),
    ("d6f83dfeaff95d596ddec26af2ee32f391c206a183b161b7980821860eeef2f5", "OKBUSD"),
    ("b00b60f88b03a6a625a8d1c048c3f66653edf217439983d037e7222c4e612819", "ATOMUSD"),
    ("c415de8d2eba7db216527dff4b60e8f3a5311c740dadb233e13e12547e226750", "NEARUSD"),
    ("40440d18fb5ad809e2825ce7dfc035cfa57135c13062a04addafe0c7f54425e0", "SATSUSD"),
    ("d40472610abe56d36d065a0cf889fc8f1dd9f3b7f2a478231a5fc6df07ea5ce3", "ONDOUSD"),
];

#[derive(Debug, Deserialize)]
pub struct HermesResponse {
    pub parsed: Option<Vec<HermesPriceFeed>>,
}

#[derive(Debug, Deserialize)]
pub struct HermesPriceFeed {
    pub id: String,
    pub price: HermesPrice,
}

#[derive(Debug, Deserialize)]
pub struct HermesPrice {
    pub price: RawInteger,
    pub expo: i32,
    pub publish_time: Option<i64>,
}

/// Hermes sends mantissas as strings; accept bare numbers too
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawInteger {
    Text(String),
    Number(i64),
}

impl RawInteger {
    fn value(&self) -> DecodeResult<i64> {
        match self {
            RawInteger::Number(n) => Ok(*n),
            RawInteger::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| DecodeError::InvalidNumber(s.clone())),
        }
    }
}

/// Polls the Hermes latest-price endpoint for the tracked pairs
pub struct HermesSource {
    client: Client,
    base_url: String,
    feeds: HashMap<String, TickerId>,
}

impl HermesSource {
    pub fn new(config: &PollingFeedConfig, tickers: &[TickerId]) -> FeedResult<Self> {
        Ok(Self::with_client(http_client(config)?, &config.base_url, tickers))
    }

    pub fn with_client(client: Client, base_url: &str, tickers: &[TickerId]) -> Self {
        let feeds = KNOWN_FEEDS
            .iter()
            .filter_map(|(id, compact)| {
                let ticker = TickerId::from_compact(compact).ok()?;
                tickers.contains(&ticker).then(|| (id.to_string(), ticker))
            })
            .collect::<HashMap<_, _>>();

        for ticker in tickers {
            if !feeds.values().any(|t| t == ticker) {
                debug!("No Hermes feed id for {}", ticker);
            }
        }

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            feeds,
        }
    }

    /// Number of tracked pairs with a known feed id
    pub fn tracked(&self) -> usize {
        self.feeds.len()
    }

    /// Decode a response, keeping only tracked feeds
    pub fn parse_response(&self, response: HermesResponse) -> PriceMap {
        let mut prices = PriceMap::new();

        for feed in response.parsed.unwrap_or_default() {
            let id = feed.id.trim_start_matches("0x").to_ascii_lowercase();
            let Some(ticker) = self.feeds.get(&id) else {
                continue;
            };

            let quote = feed
                .price
                .price
                .value()
                .and_then(|mantissa| decode_scaled(mantissa, feed.price.expo))
                .and_then(PriceQuote::try_new);

            match quote {
                Ok(quote) => {
                    prices.insert(ticker.clone(), quote);
                }
                Err(e) => debug!("Skipping Hermes price for {}: {}", ticker, e),
            }
        }

        prices
    }
}

#[async_trait]
impl PriceSource for HermesSource {
    fn provider(&self) -> &str {
        "hermes"
    }

    async fn fetch(&self) -> FeedResult<PriceMap> {
        if self.feeds.is_empty() {
            return Ok(PriceMap::new());
        }

        let url = format!("{}/v2/updates/price/latest", self.base_url);
        let mut query: Vec<(&str, String)> =
            self.feeds.keys().map(|id| ("ids[]", id.clone())).collect();
        query.push(("parsed", "true".to_string()));

        let response: HermesResponse =
            get_json(&self.client, SourceId::SecondaryA, &url, &query).await?;
        Ok(self.parse_response(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn source() -> HermesSource {
        let tickers = vec![
            TickerId::parse("BTC/USD").unwrap(),
            TickerId::parse("ETH/USD").unwrap(),
            TickerId::parse("FOO/USD").unwrap(),
        ];
        HermesSource::with_client(Client::new(), "https://hermes.example/", &tickers)
    }

    #[test]
    fn test_only_tracked_feeds_requested() {
        let source = source();
        assert_eq!(source.tracked(), 2);
        assert_eq!(source.base_url, "https://hermes.example");
    }

    #[test]
    fn test_parse_response() {
        let body = r#"{
            "binary": {"encoding": "hex", "data": []},
            "parsed": [
                {"id": "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
                 "price": {"price": "6512345678901", "conf": "1", "expo": -8, "publish_time": 1700000000}},
                {"id": "0xFF61491A931112DDF1BD8147CD1B641375F79F5825126D665480874634FD0ACE",
                 "price": {"price": 340012, "expo": -2}},
                {"id": "ef0d8b6fda2ceba41da15d4095d1da392a0d2f8ed0c6c7bc0f4cfac8c280b56d",
                 "price": {"price": "15000000000", "expo": -8}}
            ]
        }"#;
        let response: HermesResponse = serde_json::from_str(body).unwrap();
        let prices = source().parse_response(response);

        assert_eq!(prices.len(), 2);
        let btc = &prices[&TickerId::parse("BTC/USD").unwrap()];
        assert_eq!(btc.price, "65123.45678901".parse::<Decimal>().unwrap());
        assert!(btc.components.is_empty());
        let eth = &prices[&TickerId::parse("ETH/USD").unwrap()];
        assert_eq!(eth.price, "3400.12".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_bad_mantissa_and_missing_parsed() {
        let body = r#"{"parsed": [
            {"id": "e62df6c8b4a85fe1a67db44dc12de5db330f7ac66b72dc658afedf0f4a415b43",
             "price": {"price": "abc", "expo": -8}},
            {"id": "ff61491a931112ddf1bd8147cd1b641375f79f5825126d665480874634fd0ace",
             "price": {"price": "-5", "expo": 0}}
        ]}"#;
        let response: HermesResponse = serde_json::from_str(body).unwrap();
        assert!(source().parse_response(response).is_empty());

        let response: HermesResponse = serde_json::from_str("{}").unwrap();
        assert!(source().parse_response(response).is_empty());
    }

    #[test]
    fn test_known_feeds_are_compact_usd_pairs() {
        for (id, compact) in KNOWN_FEEDS {
            assert_eq!(id.len(), 64);
            let ticker = TickerId::from_compact(compact).unwrap();
            assert_eq!(ticker.quote(), "USD");
        }
    }
}
