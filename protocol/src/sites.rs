//! Measurement site directory entries

use serde::{Deserialize, Serialize};

/// A candidate measurement site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub city: String,
    #[serde(rename = "latitude", default)]
    pub lat: f64,
    #[serde(rename = "longitude", default)]
    pub lon: f64,
    #[serde(default)]
    pub roundrobin: bool,
    /// Site code, e.g. "mil04"
    pub site: String,
    #[serde(default)]
    pub uplink_speed: String,
}
