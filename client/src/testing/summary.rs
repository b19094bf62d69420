//! Speed test summary
//!
//! Reduces the per-phase results to the four values that get stored.

use crate::error::SummaryError;
use protocol::{AppInfo, LatestMeasurements, TcpInfo, TestKind};
use std::collections::HashMap;

pub const UNIT_MBIT_PER_SECOND: &str = "Mbit/s";
pub const UNIT_PERCENT: &str = "%";
pub const UNIT_MILLISECONDS: &str = "ms";

/// A value with its unit. The default (zero, no unit) stands for a metric
/// that could not be computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueUnitPair {
    pub value: f64,
    pub unit: String,
}

impl ValueUnitPair {
    fn new(value: f64, unit: &str) -> Self {
        Self {
            value,
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    /// FQDN of the server used for this test
    pub server_fqdn: String,

    /// Download speed measured at the receiver, in Mbit/s
    pub download: ValueUnitPair,

    /// Upload speed measured at the sender, in Mbit/s
    pub upload: ValueUnitPair,

    /// Retransmission rate from the server's TCP_INFO during download
    pub download_retrans: ValueUnitPair,

    /// Minimum round-trip time seen by the server during download, in ms
    pub min_rtt: ValueUnitPair,
}

impl Summary {
    /// Build the summary. Both phases must have produced a result; missing
    /// counters inside a result only leave the matching metric at zero.
    pub fn new(
        fqdn: &str,
        results: &HashMap<TestKind, LatestMeasurements>,
    ) -> Result<Self, SummaryError> {
        let (Some(download), Some(upload)) = (
            results.get(&TestKind::Download),
            results.get(&TestKind::Upload),
        ) else {
            let missing = [TestKind::Download, TestKind::Upload]
                .into_iter()
                .filter(|kind| !results.contains_key(kind))
                .collect();
            return Err(SummaryError::MissingResult(missing));
        };

        let server_tcp = download.server.tcp_info.as_ref();

        Ok(Self {
            server_fqdn: fqdn.to_string(),
            download: throughput(download.client.app_info.as_ref()),
            upload: throughput(upload.client.app_info.as_ref()),
            download_retrans: retransmission(server_tcp),
            min_rtt: min_rtt(server_tcp),
        })
    }

    /// Metrics under their stored measurement names
    pub fn metrics(&self) -> [(&'static str, &ValueUnitPair); 4] {
        [
            ("download", &self.download),
            ("upload", &self.upload),
            ("download-retransmission", &self.download_retrans),
            ("min-round-trip-time", &self.min_rtt),
        ]
    }
}

fn throughput(app_info: Option<&AppInfo>) -> ValueUnitPair {
    match app_info {
        Some(info) if info.elapsed_time > 0 => {
            let elapsed_s = info.elapsed_time as f64 / 1e6;
            let mbits = 8.0 * info.num_bytes as f64 / elapsed_s / 1e6;
            ValueUnitPair::new(mbits, UNIT_MBIT_PER_SECOND)
        }
        _ => ValueUnitPair::default(),
    }
}

fn retransmission(tcp_info: Option<&TcpInfo>) -> ValueUnitPair {
    match tcp_info {
        Some(info) if info.bytes_sent > 0 => ValueUnitPair::new(
            info.bytes_retrans as f64 / info.bytes_sent as f64 * 100.0,
            UNIT_PERCENT,
        ),
        _ => ValueUnitPair::default(),
    }
}

fn min_rtt(tcp_info: Option<&TcpInfo>) -> ValueUnitPair {
    match tcp_info {
        Some(info) => ValueUnitPair::new(info.min_rtt as f64 / 1000.0, UNIT_MILLISECONDS),
        None => ValueUnitPair::default(),
    }
}
