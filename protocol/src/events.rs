//! Line-delimited JSON events emitted by the measurement tool

use crate::error::ProtocolError;
use crate::measurement::{Measurement, TestKind};
use serde::{Deserialize, Serialize};

/// Payload shared by the lifecycle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventValue {
    pub test: TestKind,

    /// Server FQDN, only set on `connected`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Error text, only set on `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// One output line of the tool in JSON mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Key", content = "Value", rename_all = "lowercase")]
pub enum Ndt7Event {
    Starting(EventValue),
    Connected(EventValue),
    Measurement(Measurement),
    Complete(EventValue),
    Error(EventValue),
}

impl Ndt7Event {
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtocolError::EmptyLine);
        }

        Ok(serde_json::from_str(line)?)
    }
}
