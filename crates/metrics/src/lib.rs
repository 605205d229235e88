//! Feed quality metrics
//!
//! Pure, read-only computations over snapshot history and arrival times:
//! - Inter-arrival latency percentiles
//! - Missed-update (unchanged price) ratios per slot
//! - Cross-source mean-squared deviation and Spearman rank correlation
//! - Point-in-time price deltas between sources

pub mod stats;
pub mod latency;
pub mod missed;
pub mod comparison;
pub mod deltas;

pub use latency::{latency_stats, LatencyStats};
pub use missed::{missed_slot_stats, missed_slot_stats_for, MissedSlotStats, SlotCount};
pub use comparison::{comparison_report, comparison_stats, ComparisonStats, SourceComparison};
pub use deltas::{price_deltas, PriceDelta};
