//! Metrics persistence
//!
//! A [`MetricsWriter`] turns a speed test summary into one point per metric
//! and hands them to a [`PointWriter`], which owns delivery.

mod influxdb;
mod point;

pub use influxdb::InfluxDbWriter;
pub use point::Point;

use crate::config::Config;
use crate::error::{ConnectionError, WriteError};
use crate::testing::Summary;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

/// Sink for time-series points
#[async_trait]
pub trait PointWriter: Send {
    /// Queue a point. Delivery may be deferred until [`flush`](Self::flush).
    fn write_point(&mut self, point: Point);

    /// Deliver every queued point.
    async fn flush(&mut self) -> Result<(), WriteError>;

    /// Release the connection. Points written afterwards are dropped.
    async fn close(&mut self);
}

pub struct MetricsWriter<W> {
    writer: W,
}

impl MetricsWriter<InfluxDbWriter> {
    pub fn new(config: &Config) -> Result<Self, ConnectionError> {
        let writer = InfluxDbWriter::new(&config.influxdb, &config.speedtest.user_agent())?;
        Ok(Self::with_writer(writer))
    }
}

impl<W: PointWriter> MetricsWriter<W> {
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Queue the four summary metrics, all stamped with the current time.
    pub fn write(&mut self, summary: &Summary) {
        self.write_at(summary, Utc::now());
    }

    fn write_at(&mut self, summary: &Summary, now: DateTime<Utc>) {
        info!("Writing data to InfluxDB: {}", now);

        for (name, pair) in summary.metrics() {
            let point = Point::new(name, now)
                .with_tag("unit", &pair.unit)
                .with_field("value", pair.value);
            self.writer.write_point(point);
        }

        info!("Data written to InfluxDB: {}", now);
    }

    /// Flush pending points, then close. The connection is closed even
    /// when the flush fails.
    pub async fn dispose(mut self) -> Result<(), WriteError> {
        let flushed = self.writer.flush().await;
        self.writer.close().await;
        flushed
    }
}
