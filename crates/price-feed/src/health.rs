//! Per-feed health counters
//!
//! Errors never cross into the read API; they surface here and in logs.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use feedbench_core::SourceId;

/// Connection state of the streaming feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Subscribed,
    Streaming,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Subscribed,
            3 => ConnectionState::Streaming,
            _ => ConnectionState::Disconnected,
        }
    }
}

#[derive(Debug)]
pub struct FeedHealth {
    source: SourceId,
    messages: AtomicU64,
    empty_messages: AtomicU64,
    decode_failures: AtomicU64,
    fetch_failures: AtomicU64,
    reconnects: AtomicU64,
    merges: AtomicU64,
    state: AtomicU8,
}

impl FeedHealth {
    pub fn new(source: SourceId) -> Self {
        Self {
            source,
            messages: AtomicU64::new(0),
            empty_messages: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            merges: AtomicU64::new(0),
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn record_message(&self) {
        self.messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_empty_message(&self) {
        self.empty_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failure(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_merge(&self) {
        self.merges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn empty_messages(&self) -> u64 {
        self.empty_messages.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> FeedHealthStats {
        FeedHealthStats {
            source: self.source,
            state: self.state(),
            messages: self.messages.load(Ordering::Relaxed),
            empty_messages: self.empty_messages(),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a feed's counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedHealthStats {
    pub source: SourceId,
    pub state: ConnectionState,
    pub messages: u64,
    pub empty_messages: u64,
    pub decode_failures: u64,
    pub fetch_failures: u64,
    pub reconnects: u64,
    pub merges: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_state() {
        let health = FeedHealth::new(SourceId::Primary);
        assert_eq!(health.state(), ConnectionState::Disconnected);

        health.set_state(ConnectionState::Streaming);
        health.record_message();
        health.record_message();
        health.record_empty_message();
        health.record_decode_failure();
        health.record_reconnect();

        let stats = health.stats();
        assert_eq!(stats.state, ConnectionState::Streaming);
        assert_eq!(stats.messages, 2);
        assert_eq!(stats.empty_messages, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.reconnects, 1);
        assert_eq!(stats.fetch_failures, 0);
    }
}
