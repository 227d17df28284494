//! Parlay RFQ auto-quoter binary
//!
//! Loads configuration, starts the quoter, and runs until Ctrl+C. The
//! snapshot is logged periodically so an operator tailing the logs can see
//! what the quoter has seen and done.

use anyhow::Result;
use kalshi::{init_tracing, Quoter, QuoterConfig};
use parlay_quoter::bin_common::{config_path, parse_args};
use std::time::Duration;
use tracing::info;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = parse_args();
    let path = config_path(args.first().map(String::as_str));
    info!("Loading configuration from {}", path.display());
    let config = QuoterConfig::load(&path)?;

    info!("========================================");
    info!("Kalshi Parlay RFQ Auto-Quoter");
    info!("Feed:   {}", config.venue.ws_url);
    info!("Prices: yes {} / no {}", config.quoting.yes_bid, config.quoting.no_bid);
    info!("Press Ctrl+C to stop");
    info!("========================================");

    let quoter = Quoter::start(config).await?;
    quoter.shutdown_manager().spawn_signal_handler();

    let handle = quoter.handle();
    let shutdown = quoter.shutdown_manager();
    while shutdown.is_running() {
        shutdown.interruptible_sleep(SNAPSHOT_INTERVAL).await;
        if !shutdown.is_running() {
            break;
        }

        let snapshot = handle.snapshot();
        info!(
            "Heartbeat: {:?}, {} legs cataloged, {} RFQs seen, {} quotes sent, {} acceptances",
            snapshot.connection,
            snapshot.legs.values().map(|c| c.values().map(Vec::len).sum::<usize>()).sum::<usize>(),
            snapshot.rfqs.len(),
            snapshot.quotes.len(),
            snapshot.acceptances.len(),
        );
    }

    quoter.shutdown().await;
    info!("Goodbye");
    Ok(())
}
