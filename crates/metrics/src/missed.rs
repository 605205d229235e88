//! Missed-update analysis
//!
//! A slot is the interval between two consecutive snapshots. A ticker misses
//! a slot when its price is exactly equal at both ends.

use serde::Serialize;
use std::collections::BTreeMap;

use feedbench_core::{Snapshot, SourceId, TickerId};

/// Missed slots out of the total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotCount {
    pub missed: usize,
    pub total: usize,
}

impl SlotCount {
    /// Fraction in `[0, 1]`
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.missed as f64 / self.total as f64
    }

    pub fn percent(&self) -> f64 {
        self.ratio() * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissedSlotStats {
    pub source: SourceId,
    pub per_ticker: BTreeMap<TickerId, SlotCount>,
    /// Slots in which every ticker present at both ends was unchanged
    pub global: SlotCount,
}

/// Missed-slot stats for the primary source
pub fn missed_slot_stats(history: &[Snapshot]) -> Option<MissedSlotStats> {
    missed_slot_stats_for(history, SourceId::Primary)
}

/// Missed-slot stats for any source; `None` with fewer than two snapshots
pub fn missed_slot_stats_for(history: &[Snapshot], source: SourceId) -> Option<MissedSlotStats> {
    if history.len() < 2 {
        return None;
    }

    let total = history.len() - 1;
    let mut per_ticker: BTreeMap<TickerId, SlotCount> = BTreeMap::new();
    let mut global_missed = 0;

    for pair in history.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let (Some(prev), Some(curr)) = (prev.source_prices(source), curr.source_prices(source)) else {
            // nothing present at both ends
            global_missed += 1;
            continue;
        };

        let mut all_unchanged = true;
        for (ticker, prev_quote) in prev {
            let Some(curr_quote) = curr.get(ticker) else {
                continue;
            };

            let count = per_ticker
                .entry(ticker.clone())
                .or_insert(SlotCount { missed: 0, total });

            if prev_quote.price == curr_quote.price {
                count.missed += 1;
            } else {
                all_unchanged = false;
            }
        }

        if all_unchanged {
            global_missed += 1;
        }
    }

    Some(MissedSlotStats {
        source,
        per_ticker,
        global: SlotCount {
            missed: global_missed,
            total,
        },
    })
}
