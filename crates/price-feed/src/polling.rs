//! Polling (pull-based) feed loop

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use feedbench_core::{FeedResult, PriceMap, SourceId};

use crate::health::FeedHealth;
use crate::signal::RunSignal;
use crate::state::SnapshotStore;

/// One-shot request/response price provider
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Provider name for logs
    fn provider(&self) -> &str;

    /// Fetch and decode the current prices. An empty map is not an error.
    async fn fetch(&self) -> FeedResult<PriceMap>;
}

/// Fetches from a [`PriceSource`] at a fixed interval and merges the result
pub struct PollingFeed {
    source_id: SourceId,
    source: Arc<dyn PriceSource>,
    interval: Duration,
    store: Arc<SnapshotStore>,
    health: Arc<FeedHealth>,
}

impl PollingFeed {
    pub fn new(
        source_id: SourceId,
        source: Arc<dyn PriceSource>,
        interval: Duration,
        store: Arc<SnapshotStore>,
        health: Arc<FeedHealth>,
    ) -> Self {
        Self {
            source_id,
            source,
            interval,
            store,
            health,
        }
    }

    /// Poll until stopped; the interval sleep follows every cycle
    pub async fn run(&self, mut signal: RunSignal) {
        info!(
            "Polling {} ({}) every {:?}",
            self.source_id,
            self.source.provider(),
            self.interval
        );

        while signal.is_running() {
            self.poll_once().await;

            if !signal.sleep(self.interval).await {
                break;
            }
        }

        info!("Polling feed {} stopped", self.source_id);
    }

    /// One fetch cycle. Returns whether a merge was emitted.
    pub async fn poll_once(&self) -> bool {
        match self.source.fetch().await {
            Ok(prices) if prices.is_empty() => {
                debug!("{} returned no prices", self.source.provider());
                false
            }
            Ok(prices) => {
                self.health.record_message();
                self.store.merge(self.source_id, prices);
                self.health.record_merge();
                true
            }
            Err(e) => {
                // previous cache for this source stays in place
                self.health.record_fetch_failure();
                warn!("{} fetch failed: {}", self.source.provider(), e);
                false
            }
        }
    }
}
