//! Price feed ingestion
//!
//! Features:
//! - Streaming websocket feed with automatic reconnection
//! - Polling HTTP feeds behind a pluggable source trait
//! - Single-lock snapshot store with append-only history
//! - Coordinator that runs every feed on a background runtime

pub mod coordinator;
pub mod feeds;
pub mod health;
pub mod polling;
pub mod signal;
pub mod sources;
pub mod state;

pub use coordinator::{CoordinatorStats, IngestionCoordinator};
pub use feeds::{MessageOutcome, PrimaryStreamFeed, StreamFeedConfig};
pub use health::{ConnectionState, FeedHealth, FeedHealthStats};
pub use polling::{PollingFeed, PriceSource};
pub use signal::RunSignal;
pub use sources::{ExtendedSource, HermesSource};
pub use state::{ArrivalLog, SnapshotStore, StoreStats};
