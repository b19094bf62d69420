//! Measurement data structures
//!
//! Field names follow the JSON emitted by the measurement tool, which uses
//! Go-style PascalCase keys.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two sequential sub-tests of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Download,
    Upload,
}

impl TestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Download => "download",
            TestKind::Upload => "upload",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the connection produced a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Client,
    Server,
}

/// Application level counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppInfo {
    /// Bytes transferred at application level
    #[serde(default)]
    pub num_bytes: i64,

    /// Microseconds since the beginning of the phase
    #[serde(default)]
    pub elapsed_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionInfo {
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub server: String,
    #[serde(rename = "UUID", default)]
    pub uuid: String,
}

/// Kernel TCP_INFO snapshot reported by the server.
///
/// Only the counters used downstream are modelled, the rest of the
/// structure is ignored on decode. Times are in microseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TcpInfo {
    #[serde(default)]
    pub bytes_acked: i64,
    #[serde(default)]
    pub bytes_received: i64,
    #[serde(default)]
    pub bytes_sent: i64,
    #[serde(default)]
    pub bytes_retrans: i64,
    #[serde(default)]
    pub total_retrans: i64,
    #[serde(rename = "MinRTT", default)]
    pub min_rtt: i64,
    #[serde(rename = "RTT", default)]
    pub rtt: i64,
    #[serde(rename = "RTTVar", default)]
    pub rtt_var: i64,
    #[serde(default)]
    pub elapsed_time: i64,
}

/// Intermediate sample emitted while a phase is in progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(rename = "AppInfo", default, skip_serializing_if = "Option::is_none")]
    pub app_info: Option<AppInfo>,

    #[serde(rename = "ConnectionInfo", default, skip_serializing_if = "Option::is_none")]
    pub connection_info: Option<ConnectionInfo>,

    #[serde(rename = "Origin", default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,

    #[serde(rename = "Test", default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestKind>,

    #[serde(rename = "TCPInfo", default, skip_serializing_if = "Option::is_none")]
    pub tcp_info: Option<TcpInfo>,
}

/// Final outcome of one phase: the most recent sample seen from each side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatestMeasurements {
    pub client: Measurement,
    pub server: Measurement,
    pub connection_info: Option<ConnectionInfo>,
}

impl LatestMeasurements {
    /// Record a sample, replacing the previous one from the same origin.
    ///
    /// Samples without an origin are attributed to the client, which is
    /// what the tool does for its own application-level counters.
    pub fn record(&mut self, measurement: Measurement) {
        if let Some(info) = &measurement.connection_info {
            self.connection_info = Some(info.clone());
        }

        match measurement.origin {
            Some(Origin::Server) => self.server = measurement,
            Some(Origin::Client) | None => self.client = measurement,
        }
    }
}
