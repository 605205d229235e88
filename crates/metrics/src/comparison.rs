//! Cross-source comparison of the primary feed against each secondary feed

use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

use feedbench_core::{Snapshot, SourceId, TickerId};

use crate::stats::{mean_squared_error, spearman};

/// Agreement between the primary and one secondary source for one ticker
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SourceComparison {
    /// Snapshots in which both sources had a price
    pub samples: usize,
    pub mse: Option<f64>,
    /// Undefined with fewer than two samples or a constant series
    pub spearman: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonStats {
    pub ticker: TickerId,
    pub by_source: BTreeMap<SourceId, SourceComparison>,
}

impl ComparisonStats {
    pub fn get(&self, source: SourceId) -> Option<&SourceComparison> {
        self.by_source.get(&source)
    }
}

/// Aligned `(primary, secondary)` series built only from snapshots where
/// both sources report the ticker.
pub fn aligned_series(
    history: &[Snapshot],
    ticker: &TickerId,
    secondary: SourceId,
) -> (Vec<f64>, Vec<f64>) {
    history
        .iter()
        .filter_map(|snapshot| {
            let primary = snapshot.price(SourceId::Primary, ticker)?.to_f64()?;
            let other = snapshot.price(secondary, ticker)?.to_f64()?;
            Some((primary, other))
        })
        .unzip()
}

/// Compare the primary series for `ticker` against every secondary source
pub fn comparison_stats(history: &[Snapshot], ticker: &TickerId) -> ComparisonStats {
    let by_source = SourceId::SECONDARIES
        .iter()
        .map(|&source| {
            let (primary, other) = aligned_series(history, ticker, source);
            let comparison = SourceComparison {
                samples: primary.len(),
                mse: mean_squared_error(&primary, &other),
                spearman: spearman(&primary, &other),
            };
            (source, comparison)
        })
        .collect();

    ComparisonStats {
        ticker: ticker.clone(),
        by_source,
    }
}

/// Comparison stats for many tickers, computed in parallel
pub fn comparison_report(history: &[Snapshot], tickers: &[TickerId]) -> Vec<ComparisonStats> {
    let report: Vec<ComparisonStats> = tickers
        .par_iter()
        .map(|ticker| comparison_stats(history, ticker))
        .collect();

    debug!(
        "Compared {} tickers over {} snapshots",
        report.len(),
        history.len()
    );

    report
}
