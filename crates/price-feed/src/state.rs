//! Shared snapshot state
//!
//! One mutex serializes merges from every feed into a consistent
//! current-state view and an append-only history. Readers always get copies.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use feedbench_core::{PriceMap, Snapshot, SourceId, StoreConfig};

struct StoreInner {
    latest: BTreeMap<SourceId, PriceMap>,
    last_merge: Option<DateTime<Utc>>,
    primary_seen: bool,
    history: VecDeque<Snapshot>,
    appended: u64,
    merges: u64,
    dropped_events: u64,
}

/// Latest price per source per ticker plus the merged snapshot history
pub struct SnapshotStore {
    inner: Mutex<StoreInner>,
    history_capacity: Option<NonZeroUsize>,
    events: Option<mpsc::Sender<Snapshot>>,
}

impl SnapshotStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                latest: SourceId::ALL.iter().map(|s| (*s, PriceMap::new())).collect(),
                last_merge: None,
                primary_seen: false,
                history: VecDeque::new(),
                appended: 0,
                merges: 0,
                dropped_events: 0,
            }),
            history_capacity: config.history_capacity,
            events: None,
        }
    }

    /// Store that also publishes every appended snapshot to `events`
    pub fn with_events(config: &StoreConfig, events: mpsc::Sender<Snapshot>) -> Self {
        Self {
            events: Some(events),
            ..Self::new(config)
        }
    }

    /// Replace the cached prices of `source` and, once the primary source has
    /// produced a price, append a snapshot of all cached sources.
    ///
    /// Returns the appended snapshot, if any.
    pub fn merge(&self, source: SourceId, prices: PriceMap) -> Option<Snapshot> {
        let mut inner = self.inner.lock();

        if source.is_primary() && !prices.is_empty() {
            inner.primary_seen = true;
        }
        inner.latest.insert(source, prices);
        inner.merges += 1;

        // Wall clock may step back; history timestamps never do
        let now = Utc::now();
        let timestamp = match inner.last_merge {
            Some(last) if last > now => last,
            _ => now,
        };
        inner.last_merge = Some(timestamp);

        if !inner.primary_seen {
            debug!("Merge from {} before first primary price, not appended", source);
            return None;
        }

        let snapshot = Snapshot {
            timestamp,
            prices: inner.latest.clone(),
        };

        if let Some(capacity) = self.history_capacity {
            while inner.history.len() >= capacity.get() {
                inner.history.pop_front();
            }
        }
        inner.history.push_back(snapshot.clone());
        inner.appended += 1;

        // Published under the lock so queue order matches history order
        if let Some(events) = &self.events {
            match events.try_send(snapshot.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    inner.dropped_events += 1;
                    debug!("Snapshot queue full, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    inner.dropped_events += 1;
                }
            }
        }

        Some(snapshot)
    }

    /// Copy of the history, oldest first
    pub fn read_history(&self) -> Vec<Snapshot> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<Snapshot> {
        self.inner.lock().history.back().cloned()
    }

    /// Copy of the cached prices of one source
    pub fn current_prices(&self, source: SourceId) -> PriceMap {
        self.inner
            .lock()
            .latest
            .get(&source)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.lock();
        StoreStats {
            history_len: inner.history.len(),
            total_appended: inner.appended,
            merges: inner.merges,
            dropped_events: inner.dropped_events,
            last_merge: inner.last_merge,
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(&StoreConfig::default())
    }
}

/// Statistics about the snapshot store
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub history_len: usize,
    /// Monotone even when the history is a bounded ring
    pub total_appended: u64,
    pub merges: u64,
    pub dropped_events: u64,
    pub last_merge: Option<DateTime<Utc>>,
}

/// Receipt instants of raw push-feed messages
pub struct ArrivalLog {
    arrivals: Mutex<VecDeque<Instant>>,
    capacity: Option<NonZeroUsize>,
    total: AtomicU64,
}

impl ArrivalLog {
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            arrivals: Mutex::new(VecDeque::new()),
            capacity,
            total: AtomicU64::new(0),
        }
    }

    pub fn record(&self) {
        self.record_at(Instant::now());
    }

    pub fn record_at(&self, at: Instant) {
        let mut arrivals = self.arrivals.lock();
        if let Some(capacity) = self.capacity {
            while arrivals.len() >= capacity.get() {
                arrivals.pop_front();
            }
        }
        arrivals.push_back(at);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Vec<Instant> {
        self.arrivals.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.arrivals.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for ArrivalLog {
    fn default() -> Self {
        Self::new(None)
    }
}
