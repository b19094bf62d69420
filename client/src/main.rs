//! speedtest-influxdb - network speed test to InfluxDB
//!
//! Runs one download and one upload test through the ndt7 measurement tool
//! and stores throughput, retransmission rate and minimum RTT in InfluxDB.

mod config;
mod error;
mod output;
mod sites;
mod storage;
mod testing;

#[cfg(test)]
mod test_http;

use anyhow::{Context, Result};
use config::{CacheConfig, Config, Loaded};
use error::ConfigError;
use protocol::Measurement;
use storage::MetricsWriter;
use testing::{Summary, TestRunner};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(Loaded::Completion(script)) => {
            print!("{}", script);
            return Ok(());
        }
        Ok(Loaded::ListSites(cache)) => return list_sites(&cache).await,
        Ok(Loaded::Run(config)) => config,
        Err(ConfigError::Arguments(e)) => e.exit(),
        Err(e) => return Err(anyhow::Error::new(e).context("Invalid configuration")),
    };

    info!("speedtest-influxdb v{}", env!("CARGO_PKG_VERSION"));

    let mut runner = TestRunner::new(&config.speedtest);
    let mut metrics = MetricsWriter::new(&config).context("Failed to set up InfluxDB client")?;

    let drain = runner.take_events().map(|events| tokio::spawn(traffic(events)));

    let outcome = runner.run().await.context("Speed test failed")?;

    let summary = Summary::new(&outcome.fqdn, &outcome.results)
        .context("Speed test produced no usable result")?;
    output::print_summary(&summary);

    metrics.write(&summary);

    runner.dispose();
    let flushed = metrics.dispose().await;

    if let Some(drain) = drain {
        if let Err(e) = drain.await {
            warn!("Event drain task failed: {}", e);
        }
    }

    flushed.context("Failed to write metrics to InfluxDB")?;

    info!("Resources are disposed. Bye");
    Ok(())
}

/// Log intermediate measurements until the runner closes the stream
async fn traffic(mut events: mpsc::Receiver<Measurement>) {
    let mut count = 0usize;

    while let Some(m) = events.recv().await {
        count += 1;
        debug!(
            test = ?m.test,
            origin = ?m.origin,
            elapsed_us = m.app_info.as_ref().map(|a| a.elapsed_time),
            num_bytes = m.app_info.as_ref().map(|a| a.num_bytes),
            "."
        );
    }

    debug!("Measurement stream closed after {} events", count);
}

async fn list_sites(cache: &CacheConfig) -> Result<()> {
    let user_agent = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
    let directory = sites::SiteDirectory::new(cache, user_agent)?;

    let sites = directory.list().await?;
    output::print_sites(&sites);

    Ok(())
}
