//! Error types for each stage of a run

use protocol::TestKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {field}: {reason}")]
    Invalid {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Arguments(#[from] clap::Error),
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid InfluxDB url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to start {kind} test with {program}: {source}")]
    Spawn {
        kind: TestKind,
        program: String,
        source: std::io::Error,
    },

    #[error("Measurement tool produced no output stream for {0} test")]
    NoOutput(TestKind),

    #[error("Speed test runner has already been used")]
    AlreadyRun,

    #[error("{kind} test timed out")]
    Timeout { kind: TestKind },

    #[error("{kind} test failed: {reason}")]
    Phase { kind: TestKind, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SummaryError {
    #[error("download or upload failed (missing: {})", missing_list(.0))]
    MissingResult(Vec<TestKind>),
}

fn missing_list(kinds: &[TestKind]) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to send points to InfluxDB: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("InfluxDB rejected {points} points with status {status}: {body}")]
    Rejected {
        points: usize,
        status: u16,
        body: String,
    },
}

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(reqwest::Error),

    #[error("Failed to fetch site directory from {url}: {source}")]
    Fetch {
        url: String,
        source: std::sync::Arc<reqwest::Error>,
    },
}
