//! Speed test protocol library
//!
//! Data model of the external ndt7 measurement tool and of the M-Lab site
//! directory. The measurement wire protocol itself is implemented by the
//! tool; this crate only describes what it reports back.

pub mod error;
pub mod events;
pub mod measurement;
pub mod sites;

pub use error::ProtocolError;
pub use events::{EventValue, Ndt7Event};
pub use measurement::{AppInfo, ConnectionInfo, LatestMeasurements, Measurement, Origin, TcpInfo, TestKind};
pub use sites::Site;

/// Public site directory of the measurement platform
pub const SITE_DIRECTORY_URL: &str =
    "https://siteinfo.mlab-oti.measurementlab.net/v1/sites/locations.json";
