//! Feedbench - price feed quality monitor
//!
//! Streams the primary oracle feed next to two polled reference feeds and
//! prints merged snapshots with cross-source metrics.

mod console;
mod settings;

use anyhow::Context;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use feedbench_price_feed::IngestionCoordinator;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting feedbench v{}", env!("CARGO_PKG_VERSION"));

    let config = settings::load()?;
    info!(
        "Environment {} tracking {} pairs via {}",
        config.environment,
        config.pairs.len(),
        config.primary.ws_url
    );

    let mut coordinator = IngestionCoordinator::new(config)?;
    let mut snapshots = coordinator
        .take_snapshot_receiver()
        .context("snapshot receiver already taken")?;

    coordinator.start()?;
    info!("Press Ctrl+C to shutdown");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    summary.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            snapshot = snapshots.recv() => {
                let Some(snapshot) = snapshot else {
                    break;
                };
                let report = coordinator.comparison_report();
                print!("{}", console::render_snapshot(&snapshot, &report));
            }
            _ = summary.tick() => {
                let latency = coordinator.latency_stats();
                let missed = coordinator.missed_slot_stats();
                print!(
                    "{}",
                    console::render_summary(
                        latency.as_ref(),
                        missed.as_ref(),
                        coordinator.empty_message_count(),
                        &coordinator.health(),
                    )
                );
            }
        }
    }

    // Joining the feed thread blocks
    let coordinator = tokio::task::spawn_blocking(move || {
        coordinator.stop();
        coordinator
    })
    .await?;

    let stats = coordinator.stats();
    info!(
        "Shutdown complete: {} snapshots, {} merges, {} dropped events",
        stats.store.total_appended, stats.store.merges, stats.store.dropped_events
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received termination signal");
        }
    }
}
