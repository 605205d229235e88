//! Point-in-time price deltas

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use feedbench_core::{Snapshot, SourceId, TickerId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDelta {
    pub ticker: TickerId,
    pub source: SourceId,
    pub primary: Decimal,
    pub secondary: Decimal,
    /// `(primary - secondary) * 100 / primary`; `None` when primary is zero
    pub delta_pct: Option<f64>,
}

/// Deltas of each secondary against the primary for every primary ticker
/// that the secondary also reports.
pub fn price_deltas(snapshot: &Snapshot) -> Vec<PriceDelta> {
    let mut deltas = Vec::new();

    for ticker in snapshot.primary_tickers() {
        let Some(primary) = snapshot.price(SourceId::Primary, ticker) else {
            continue;
        };

        for source in SourceId::SECONDARIES {
            let Some(secondary) = snapshot.price(source, ticker) else {
                continue;
            };

            let delta_pct = ((primary - secondary) * Decimal::ONE_HUNDRED)
                .checked_div(primary)
                .and_then(|d| d.to_f64());

            deltas.push(PriceDelta {
                ticker: ticker.clone(),
                source,
                primary,
                secondary,
                delta_pct,
            });
        }
    }

    deltas
}
