//! Plain-text rendering of snapshots and metrics

use rust_decimal::Decimal;
use std::fmt::Write;

use feedbench_core::{Snapshot, SourceId};
use feedbench_metrics::{price_deltas, ComparisonStats, LatencyStats, MissedSlotStats};
use feedbench_price_feed::FeedHealthStats;

const UNAVAILABLE: &str = "n/a";

fn price(value: Option<Decimal>) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |p| p.normalize().to_string())
}

fn metric(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |v| format!("{:.*}", precision, v))
}

/// One line per primary ticker: prices, deltas, and comparison stats
pub fn render_snapshot(snapshot: &Snapshot, report: &[ComparisonStats]) -> String {
    let mut out = String::new();
    let deltas = price_deltas(snapshot);

    let _ = writeln!(out, "[{}]", snapshot.timestamp.format("%H:%M:%S%.3f"));

    for ticker in snapshot.primary_tickers() {
        let _ = write!(
            out,
            "  {:<10} {}={}",
            ticker,
            SourceId::Primary,
            price(snapshot.price(SourceId::Primary, ticker))
        );

        for source in SourceId::SECONDARIES {
            let delta = deltas
                .iter()
                .find(|d| &d.ticker == ticker && d.source == source)
                .and_then(|d| d.delta_pct);
            let comparison = report
                .iter()
                .find(|c| &c.ticker == ticker)
                .and_then(|c| c.get(source));

            let _ = write!(
                out,
                " | {}={} ({}%) rho={} mse={}",
                source,
                price(snapshot.price(source, ticker)),
                metric(delta, 4),
                metric(comparison.and_then(|c| c.spearman), 3),
                metric(comparison.and_then(|c| c.mse), 6),
            );
        }
        out.push('\n');
    }

    out
}

/// Periodic summary of feed quality
pub fn render_summary(
    latency: Option<&LatencyStats>,
    missed: Option<&MissedSlotStats>,
    empty_messages: u64,
    feeds: &[FeedHealthStats],
) -> String {
    let mut out = String::from("--- summary ---\n");

    match latency {
        Some(l) => {
            let _ = writeln!(
                out,
                "latency ms ({} gaps): mean={:.1} q1={:.1} median={:.1} q3={:.1} p90={:.1} p99={:.1}",
                l.samples, l.mean, l.q1, l.median, l.q3, l.p90, l.p99
            );
        }
        None => {
            let _ = writeln!(out, "latency: {}", UNAVAILABLE);
        }
    }

    match missed {
        Some(m) => {
            let _ = writeln!(
                out,
                "missed slots: global {}/{} ({:.2}%)",
                m.global.missed,
                m.global.total,
                m.global.percent()
            );
            for (ticker, count) in &m.per_ticker {
                let _ = writeln!(
                    out,
                    "  {:<10} {}/{} ({:.2}%)",
                    ticker,
                    count.missed,
                    count.total,
                    count.percent()
                );
            }
        }
        None => {
            let _ = writeln!(out, "missed slots: {}", UNAVAILABLE);
        }
    }

    let _ = writeln!(out, "empty messages: {}", empty_messages);

    for feed in feeds {
        let _ = writeln!(
            out,
            "  {:<12} {:?} messages={} merges={} decode_failures={} fetch_failures={} reconnects={}",
            feed.source,
            feed.state,
            feed.messages,
            feed.merges,
            feed.decode_failures,
            feed.fetch_failures,
            feed.reconnects
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use feedbench_core::{PriceMap, PriceQuote, TickerId};
    use feedbench_metrics::comparison_report;

    fn prices(price: i64) -> PriceMap {
        [(TickerId::parse("BTC/USD").unwrap(), PriceQuote::try_new(price.into()).unwrap())]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_render_snapshot() {
        let snapshot = Snapshot {
            timestamp: Utc::now(),
            prices: [
                (SourceId::Primary, prices(100)),
                (SourceId::SecondaryA, prices(99)),
                (SourceId::SecondaryB, PriceMap::new()),
            ]
            .into_iter()
            .collect(),
        };
        let report = comparison_report(&[snapshot.clone()], &[TickerId::parse("BTC/USD").unwrap()]);

        let text = render_snapshot(&snapshot, &report);
        assert!(text.contains("BTC/USD"));
        assert!(text.contains("primary=100"));
        assert!(text.contains("secondary-a=99 (1.0000%)"));
        assert!(text.contains("secondary-b=n/a (n/a%)"));
        // one aligned sample: no correlation yet
        assert!(text.contains("rho=n/a"));
    }

    #[test]
    fn test_render_summary_unavailable() {
        let text = render_summary(None, None, 3, &[]);
        assert!(text.contains("latency: n/a"));
        assert!(text.contains("missed slots: n/a"));
        assert!(text.contains("empty messages: 3"));
    }
}
