//! WebSocket price feed (primary, push-based)

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use feedbench_core::{
    decode_price, decode_ticker, DecodeError, DecodeResult, FeedError, FeedResult, PriceMap,
    PriceQuote, SourceId, TickerId,
};

use crate::health::{ConnectionState, FeedHealth};
use crate::signal::RunSignal;
use crate::state::{ArrivalLog, SnapshotStore};

/// Subscription request sent once per connection
#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    pub msg_type: &'static str,
    pub pairs: &'a [TickerId],
}

/// Inbound record. A record without `oracle_prices` is an empty message.
///
/// Entries stay untyped here so one malformed entry cannot fail the batch.
#[derive(Debug, Deserialize)]
pub struct StreamMessage {
    pub oracle_prices: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct OraclePriceEntry {
    pub global_asset_id: Option<String>,
    pub median_price: Option<String>,
    /// Decoded per component; a malformed component is dropped on its own
    pub signed_prices: Option<Vec<Value>>,
}

/// One publisher's component price
#[derive(Debug, Deserialize)]
pub struct SignedPrice {
    pub signing_key: Option<String>,
    pub oracle_price: Option<String>,
}

/// What one inbound message did to the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// No `oracle_prices` field
    Empty,
    /// Not a parseable record
    Invalid,
    /// Entries present but none decodable
    NoUsableUpdates,
    /// Number of tickers updated; a merge was emitted
    Updated(usize),
}

/// Stream feed configuration
#[derive(Debug, Clone)]
pub struct StreamFeedConfig {
    pub ws_url: String,
    pub pairs: Vec<TickerId>,
    pub reconnect_delay: Duration,
}

/// Streaming feed: connects, subscribes, and merges every decodable batch.
///
/// The per-ticker price map persists across messages and reconnects, so each
/// merge carries the full current map rather than a diff.
pub struct PrimaryStreamFeed {
    config: StreamFeedConfig,
    store: Arc<SnapshotStore>,
    arrivals: Arc<ArrivalLog>,
    health: Arc<FeedHealth>,
    prices: PriceMap,
}

impl PrimaryStreamFeed {
    pub fn new(
        config: StreamFeedConfig,
        store: Arc<SnapshotStore>,
        arrivals: Arc<ArrivalLog>,
        health: Arc<FeedHealth>,
    ) -> Self {
        Self {
            config,
            store,
            arrivals,
            health,
            prices: PriceMap::new(),
        }
    }

    /// Connect and stream until stopped, reconnecting after every failure
    pub async fn run(&mut self, mut signal: RunSignal) {
        while signal.is_running() {
            match self.connect_and_stream(&mut signal).await {
                Ok(()) => {
                    info!("Primary feed stopped");
                }
                Err(e) if e.is_connection_failure() => {
                    warn!("Primary feed connection lost: {}", e);
                }
                Err(e) => {
                    error!("Primary feed error: {}", e);
                }
            }

            self.health.set_state(ConnectionState::Disconnected);

            if !signal.is_running() {
                break;
            }

            self.health.record_reconnect();
            warn!(
                "Reconnecting primary feed in {:?}",
                self.config.reconnect_delay
            );

            if !signal.sleep(self.config.reconnect_delay).await {
                break;
            }
        }
    }

    async fn connect_and_stream(&mut self, signal: &mut RunSignal) -> FeedResult<()> {
        info!("Connecting to primary feed at {}", self.config.ws_url);

        let (ws_stream, _) = connect_async(&self.config.ws_url)
            .await
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        self.health.set_state(ConnectionState::Connected);
        info!("Connected to primary feed");

        let request = SubscribeRequest {
            msg_type: "subscribe",
            pairs: &self.config.pairs,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| FeedError::SubscriptionFailed(e.to_string()))?;

        write
            .send(Message::Text(payload))
            .await
            .map_err(|e| FeedError::SubscriptionFailed(e.to_string()))?;

        self.health.set_state(ConnectionState::Subscribed);
        debug!("Subscribed to {} pairs", self.config.pairs.len());
        self.health.set_state(ConnectionState::Streaming);

        loop {
            let msg = tokio::select! {
                msg = read.next() => msg,
                _ = signal.stopped() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
            };

            match msg {
                Some(Ok(Message::Text(text))) => {
                    self.arrivals.record();
                    self.handle_message(&text);
                }
                Some(Ok(Message::Binary(data))) => {
                    self.arrivals.record();
                    match std::str::from_utf8(&data) {
                        Ok(text) => {
                            self.handle_message(text);
                        }
                        Err(_) => {
                            self.health.record_message();
                            self.health.record_decode_failure();
                            debug!("Dropping non-UTF-8 binary frame");
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;
                }
                Some(Ok(Message::Close(frame))) => {
                    info!("Primary feed closed by server: {:?}", frame);
                    return Err(FeedError::Disconnected);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Err(FeedError::ConnectionFailed(e.to_string()));
                }
                None => return Err(FeedError::Disconnected),
            }
        }
    }

    /// Decode one inbound message and merge if anything decoded
    pub fn handle_message(&mut self, text: &str) -> MessageOutcome {
        self.health.record_message();

        let message: StreamMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                self.health.record_decode_failure();
                warn!("Unparseable primary message: {}", e);
                return MessageOutcome::Invalid;
            }
        };

        let Some(entries) = message.oracle_prices else {
            self.health.record_empty_message();
            return MessageOutcome::Empty;
        };

        let mut updated = 0;
        for entry in entries {
            match decode_entry(entry) {
                Ok((ticker, quote)) => {
                    self.prices.insert(ticker, quote);
                    updated += 1;
                }
                Err(e) => {
                    // previous price, if any, stays under its own ticker
                    self.health.record_decode_failure();
                    debug!("Skipping undecodable entry: {}", e);
                }
            }
        }

        if updated == 0 {
            return MessageOutcome::NoUsableUpdates;
        }

        self.store.merge(SourceId::Primary, self.prices.clone());
        self.health.record_merge();
        MessageOutcome::Updated(updated)
    }

    /// Current per-ticker prices held by the feed
    pub fn prices(&self) -> &PriceMap {
        &self.prices
    }
}

/// Decode one entry; component prices that fail to decode are dropped
fn decode_entry(raw: Value) -> DecodeResult<(TickerId, PriceQuote)> {
    let entry: OraclePriceEntry =
        serde_json::from_value(raw).map_err(|e| DecodeError::MalformedEntry(e.to_string()))?;
    let ticker = decode_ticker(entry.global_asset_id.as_deref().ok_or(DecodeError::EmptyInput)?)?;
    let price = decode_price(entry.median_price.as_deref().ok_or(DecodeError::EmptyInput)?)?;

    let components: BTreeMap<_, _> = entry
        .signed_prices
        .unwrap_or_default()
        .into_iter()
        .filter_map(|raw| {
            let component: SignedPrice = serde_json::from_value(raw).ok()?;
            let key = component.signing_key?;
            let value = decode_price(component.oracle_price.as_deref()?).ok()?;
            Some((key, value))
        })
        .collect();

    Ok((ticker, PriceQuote::try_new(price)?.with_components(components)))
}
