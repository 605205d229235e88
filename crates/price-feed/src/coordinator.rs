//! Ingestion coordinator - owns the feeds, the store, and their lifecycle

use futures::future::{BoxFuture, FutureExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use feedbench_core::{
    FeedError, FeedResult, MonitorConfig, PollingFeedConfig, Snapshot, SourceId, TickerId,
};
use feedbench_metrics::{
    comparison_report, comparison_stats, latency_stats, missed_slot_stats, price_deltas,
    ComparisonStats, LatencyStats, MissedSlotStats, PriceDelta,
};

use crate::feeds::{PrimaryStreamFeed, StreamFeedConfig};
use crate::health::{FeedHealth, FeedHealthStats};
use crate::polling::{PollingFeed, PriceSource};
use crate::signal::RunSignal;
use crate::sources::{ExtendedSource, HermesSource};
use crate::state::{ArrivalLog, SnapshotStore, StoreStats};

/// Runs the three feeds on a background runtime and exposes read-only views
/// of what they produced.
///
/// `start` and `stop` block the caller only for thread spawn and join; call
/// `stop` from outside any tokio runtime (or via `spawn_blocking`).
pub struct IngestionCoordinator {
    config: MonitorConfig,
    tickers: Vec<TickerId>,
    store: Arc<SnapshotStore>,
    arrivals: Arc<ArrivalLog>,
    health: BTreeMap<SourceId, Arc<FeedHealth>>,
    secondary_a: Option<Arc<dyn PriceSource>>,
    secondary_b: Option<Arc<dyn PriceSource>>,
    snapshot_rx: Option<mpsc::Receiver<Snapshot>>,
    running: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
}

impl IngestionCoordinator {
    /// Coordinator with the Hermes and Extended sources for enabled secondaries
    pub fn new(config: MonitorConfig) -> FeedResult<Self> {
        config.validate()?;
        let tickers = config.tickers()?;

        let secondary_a = enabled(&config.secondary_a)
            .map(|c| HermesSource::new(c, &tickers))
            .transpose()?
            .map(|s| Arc::new(s) as Arc<dyn PriceSource>);
        let secondary_b = enabled(&config.secondary_b)
            .map(|c| ExtendedSource::new(c, &tickers))
            .transpose()?
            .map(|s| Arc::new(s) as Arc<dyn PriceSource>);

        Self::with_sources(config, secondary_a, secondary_b)
    }

    /// Coordinator with caller-supplied polling sources
    pub fn with_sources(
        config: MonitorConfig,
        secondary_a: Option<Arc<dyn PriceSource>>,
        secondary_b: Option<Arc<dyn PriceSource>>,
    ) -> FeedResult<Self> {
        config.validate()?;
        let tickers = config.tickers()?;

        let (snapshot_tx, snapshot_rx) = mpsc::channel(config.store.event_queue_capacity);
        let store = Arc::new(SnapshotStore::with_events(&config.store, snapshot_tx));
        let arrivals = Arc::new(ArrivalLog::new(config.store.arrival_capacity));
        let health = SourceId::ALL
            .iter()
            .map(|&source| (source, Arc::new(FeedHealth::new(source))))
            .collect();
        let (running, _) = watch::channel(false);

        Ok(Self {
            config,
            tickers,
            store,
            arrivals,
            health,
            secondary_a,
            secondary_b,
            snapshot_rx: Some(snapshot_rx),
            running,
            worker: None,
        })
    }

    /// Spawn the feeds on a dedicated runtime thread. No-op if running.
    pub fn start(&mut self) -> FeedResult<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("feedbench-feed")
            .enable_all()
            .build()
            .map_err(|e| FeedError::Runtime(e.to_string()))?;

        self.running.send_replace(true);
        let tasks = self.feed_tasks();
        info!("Starting ingestion coordinator with {} feeds", tasks.len());

        let worker = std::thread::Builder::new()
            .name("feedbench-coordinator".into())
            .spawn(move || {
                runtime.block_on(async move {
                    let handles: Vec<_> = tasks.into_iter().map(tokio::spawn).collect();
                    for handle in handles {
                        if let Err(e) = handle.await {
                            error!("Feed task failed: {}", e);
                        }
                    }
                });
            })
            .map_err(|e| {
                self.running.send_replace(false);
                FeedError::Runtime(e.to_string())
            })?;

        self.worker = Some(worker);
        Ok(())
    }

    fn feed_tasks(&self) -> Vec<BoxFuture<'static, ()>> {
        let mut tasks = Vec::new();

        if self.config.primary.enabled {
            let config = StreamFeedConfig {
                ws_url: self.config.primary.ws_url.clone(),
                pairs: self.tickers.clone(),
                reconnect_delay: self.config.primary.reconnect_delay(),
            };
            let mut feed = PrimaryStreamFeed::new(
                config,
                Arc::clone(&self.store),
                Arc::clone(&self.arrivals),
                self.feed_health(SourceId::Primary),
            );
            let signal = RunSignal::new(self.running.subscribe());
            tasks.push(async move { feed.run(signal).await }.boxed());
        }

        let polled = [
            (SourceId::SecondaryA, &self.secondary_a, &self.config.secondary_a),
            (SourceId::SecondaryB, &self.secondary_b, &self.config.secondary_b),
        ];
        for (source_id, source, config) in polled {
            let Some(source) = source else {
                continue;
            };
            let feed = PollingFeed::new(
                source_id,
                Arc::clone(source),
                config.poll_interval(),
                Arc::clone(&self.store),
                self.feed_health(source_id),
            );
            let signal = RunSignal::new(self.running.subscribe());
            tasks.push(async move { feed.run(signal).await }.boxed());
        }

        tasks
    }

    /// Clear the run flag and wait for every feed to finish
    pub fn stop(&mut self) {
        self.running.send_replace(false);

        if let Some(worker) = self.worker.take() {
            info!("Stopping ingestion coordinator");
            if worker.join().is_err() {
                error!("Coordinator thread panicked");
            }
            info!("Ingestion coordinator stopped");
        }
    }

    /// True while the feed thread is alive and has not been told to stop
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished()) && *self.running.borrow()
    }

    /// New-snapshot events, in history order (can only be taken once)
    pub fn take_snapshot_receiver(&mut self) -> Option<mpsc::Receiver<Snapshot>> {
        self.snapshot_rx.take()
    }

    pub fn tickers(&self) -> &[TickerId] {
        &self.tickers
    }

    pub fn store(&self) -> Arc<SnapshotStore> {
        Arc::clone(&self.store)
    }

    pub fn history(&self) -> Vec<Snapshot> {
        self.store.read_history()
    }

    pub fn latest(&self) -> Option<Snapshot> {
        self.store.latest()
    }

    pub fn arrivals(&self) -> Vec<Instant> {
        self.arrivals.snapshot()
    }

    pub fn latency_stats(&self) -> Option<LatencyStats> {
        latency_stats(&self.arrivals.snapshot())
    }

    pub fn missed_slot_stats(&self) -> Option<MissedSlotStats> {
        missed_slot_stats(&self.store.read_history())
    }

    pub fn comparison_stats(&self, ticker: &TickerId) -> ComparisonStats {
        comparison_stats(&self.store.read_history(), ticker)
    }

    /// Comparison stats for every tracked ticker
    pub fn comparison_report(&self) -> Vec<ComparisonStats> {
        comparison_report(&self.store.read_history(), &self.tickers)
    }

    /// Primary vs secondary deltas in the latest snapshot
    pub fn price_deltas(&self) -> Vec<PriceDelta> {
        self.store
            .latest()
            .map(|snapshot| price_deltas(&snapshot))
            .unwrap_or_default()
    }

    /// Primary messages that carried no price list
    pub fn empty_message_count(&self) -> u64 {
        self.health
            .get(&SourceId::Primary)
            .map_or(0, |h| h.empty_messages())
    }

    pub fn health(&self) -> Vec<FeedHealthStats> {
        self.health.values().map(|h| h.stats()).collect()
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            running: self.is_running(),
            store: self.store.stats(),
            arrivals_total: self.arrivals.total(),
            feeds: self.health(),
        }
    }

    fn feed_health(&self, source: SourceId) -> Arc<FeedHealth> {
        self.health
            .get(&source)
            .cloned()
            .unwrap_or_else(|| Arc::new(FeedHealth::new(source)))
    }
}

impl Drop for IngestionCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn enabled(config: &PollingFeedConfig) -> Option<&PollingFeedConfig> {
    config.enabled.then_some(config)
}

#[derive(Debug, Clone)]
pub struct CoordinatorStats {
    pub running: bool,
    pub store: StoreStats,
    pub arrivals_total: u64,
    pub feeds: Vec<FeedHealthStats>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ConnectionState;
    use async_trait::async_trait;
    use feedbench_core::{encode_short_string, PriceMap, PriceQuote};
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_tungstenite::{accept_async, tungstenite::Message};

    struct FixedSource(PriceMap);

    #[async_trait]
    impl PriceSource for FixedSource {
        fn provider(&self) -> &str {
            "fixed"
        }

        async fn fetch(&self) -> FeedResult<PriceMap> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl PriceSource for FailingSource {
        fn provider(&self) -> &str {
            "failing"
        }

        async fn fetch(&self) -> FeedResult<PriceMap> {
            Err(FeedError::FetchFailed {
                feed: SourceId::SecondaryB,
                reason: "unreachable".into(),
            })
        }
    }

    fn btc() -> TickerId {
        TickerId::parse("BTC/USD").unwrap()
    }

    fn fixed(price: i64) -> Arc<dyn PriceSource> {
        let prices = [(btc(), PriceQuote::try_new(price.into()).unwrap())]
            .into_iter()
            .collect();
        Arc::new(FixedSource(prices))
    }

    fn test_config(ws_url: Option<String>) -> MonitorConfig {
        let mut config = MonitorConfig::default();
        config.pairs = vec!["BTC/USD".into()];
        config.primary.enabled = ws_url.is_some();
        config.primary.ws_url = ws_url.unwrap_or_default();
        config.primary.reconnect_delay_ms = 50;
        config.secondary_a.poll_interval_ms = 20;
        config.secondary_b.poll_interval_ms = 20;
        config
    }

    fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    /// Websocket server that streams BTC prices, with one empty message
    /// per connection, until the client goes away
    fn spawn_primary_server() -> String {
        spawn_primary_server_closing_after(None)
    }

    /// Same stream, but the server closes each connection after
    /// `close_after` messages when set
    fn spawn_primary_server_closing_after(close_after: Option<u64>) -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                while let Ok((stream, _)) = listener.accept().await {
                    tokio::spawn(async move {
                        let Ok(mut ws) = accept_async(stream).await else {
                            return;
                        };
                        // subscription request
                        let _ = ws.next().await;

                        let asset = encode_short_string("BTC/USD").unwrap();
                        for i in 0..close_after.unwrap_or(u64::MAX) {
                            let text = if i == 1 {
                                r#"{"msg_type":"heartbeat"}"#.to_string()
                            } else {
                                serde_json::json!({"oracle_prices": [{
                                    "global_asset_id": asset,
                                    "median_price": (6_500_000_000_000u64 + (i / 2) * 100_000_000).to_string(),
                                }]})
                                .to_string()
                            };
                            if ws.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                            tokio::time::sleep(Duration::from_millis(15)).await;
                        }
                        let _ = ws.close(None).await;
                    });
                }
            });
        });

        format!("ws://{}", addr)
    }

    #[test]
    fn test_secondaries_alone_never_append() {
        let mut coordinator =
            IngestionCoordinator::with_sources(test_config(None), Some(fixed(100)), Some(fixed(101)))
                .unwrap();

        coordinator.start().unwrap();
        let store = coordinator.store();
        assert!(wait_for(Duration::from_secs(5), || store.stats().merges >= 4));
        coordinator.stop();

        assert!(coordinator.history().is_empty());
        assert!(coordinator.latest().is_none());
        assert!(coordinator.missed_slot_stats().is_none());
        assert_eq!(store.current_prices(SourceId::SecondaryB)[&btc()].price, 101.into());
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut coordinator =
            IngestionCoordinator::with_sources(test_config(None), Some(fixed(1)), None).unwrap();

        coordinator.start().unwrap();
        coordinator.start().unwrap();
        assert!(coordinator.is_running());

        coordinator.stop();
        assert!(!coordinator.is_running());
        coordinator.stop();
    }

    #[test]
    fn test_fetch_failures_are_counted() {
        let mut coordinator =
            IngestionCoordinator::with_sources(test_config(None), None, Some(Arc::new(FailingSource)))
                .unwrap();

        coordinator.start().unwrap();
        let failures = |c: &IngestionCoordinator| {
            c.health()
                .iter()
                .find(|h| h.source == SourceId::SecondaryB)
                .map_or(0, |h| h.fetch_failures)
        };
        assert!(wait_for(Duration::from_secs(5), || failures(&coordinator) >= 2));
        coordinator.stop();

        assert!(coordinator.history().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = test_config(None);
        config.pairs.clear();
        assert!(IngestionCoordinator::with_sources(config, None, None).is_err());
    }

    #[test]
    fn test_not_running_once_every_feed_has_exited() {
        // enabled in config but no source supplied: nothing to run
        let mut coordinator =
            IngestionCoordinator::with_sources(test_config(None), None, None).unwrap();

        coordinator.start().unwrap();
        assert!(wait_for(Duration::from_secs(5), || !coordinator.is_running()));
        assert!(!coordinator.stats().running);
        coordinator.stop();
    }

    fn primary_health(coordinator: &IngestionCoordinator) -> FeedHealthStats {
        coordinator
            .health()
            .into_iter()
            .find(|h| h.source == SourceId::Primary)
            .unwrap()
    }

    #[test]
    fn test_reconnects_after_server_close() {
        let url = spawn_primary_server_closing_after(Some(3));
        let mut coordinator =
            IngestionCoordinator::with_sources(test_config(Some(url)), None, None).unwrap();

        coordinator.start().unwrap();
        assert!(wait_for(Duration::from_secs(10), || {
            primary_health(&coordinator).reconnects >= 1
        }));

        // only the primary merges, so growth now comes from a new connection
        let len_at_reconnect = coordinator.history().len();
        assert!(len_at_reconnect >= 1);
        assert!(wait_for(Duration::from_secs(10), || {
            coordinator.history().len() > len_at_reconnect
        }));
        coordinator.stop();

        let health = primary_health(&coordinator);
        assert!(health.reconnects >= 1);
        assert!(health.merges > len_at_reconnect as u64);
        assert_eq!(health.state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_stop_during_reconnect_backoff_is_prompt() {
        let url = spawn_primary_server_closing_after(Some(2));
        let mut config = test_config(Some(url));
        config.primary.reconnect_delay_ms = 30_000;
        let mut coordinator = IngestionCoordinator::with_sources(config, None, None).unwrap();

        coordinator.start().unwrap();
        assert!(wait_for(Duration::from_secs(10), || {
            primary_health(&coordinator).reconnects >= 1
        }));

        let started = Instant::now();
        coordinator.stop();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert!(!coordinator.is_running());
        assert_eq!(primary_health(&coordinator).reconnects, 1);
        assert_eq!(primary_health(&coordinator).state, ConnectionState::Disconnected);
    }

    #[test]
    fn test_end_to_end_with_stop_restart() {
        let url = spawn_primary_server();
        let mut coordinator =
            IngestionCoordinator::with_sources(test_config(Some(url)), Some(fixed(65_000)), None)
                .unwrap();
        let mut events = coordinator.take_snapshot_receiver().unwrap();
        assert!(coordinator.take_snapshot_receiver().is_none());

        coordinator.start().unwrap();
        assert!(wait_for(Duration::from_secs(10), || {
            coordinator.history().len() >= 6
                && coordinator
                    .latest()
                    .is_some_and(|s| s.price(SourceId::SecondaryA, &btc()).is_some())
        }));
        coordinator.stop();

        let first_len = coordinator.history().len();
        let history = coordinator.history();
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(history
            .iter()
            .all(|s| s.price(SourceId::Primary, &btc()).is_some()));

        assert!(coordinator.empty_message_count() >= 1);
        assert!(coordinator.arrivals().len() >= 3);
        assert!(coordinator.latency_stats().is_some());
        assert!(coordinator.missed_slot_stats().is_some());
        let comparison = coordinator.comparison_stats(&btc());
        assert!(comparison.get(SourceId::SecondaryA).unwrap().samples > 0);
        assert_eq!(comparison.get(SourceId::SecondaryB).unwrap().samples, 0);
        assert_eq!(coordinator.comparison_report().len(), 1);
        assert!(!coordinator.price_deltas().is_empty());

        let delivered = events.try_recv().unwrap();
        assert_eq!(delivered, history[0]);

        coordinator.start().unwrap();
        assert!(wait_for(Duration::from_secs(10), || {
            coordinator.history().len() > first_len
        }));
        coordinator.stop();

        assert!(coordinator.history().len() > first_len);
        let stats = coordinator.stats();
        assert!(!stats.running);
        assert_eq!(stats.store.history_len as u64, stats.store.total_appended);
    }
}
