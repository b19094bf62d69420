//! InfluxDB v2 HTTP write client

use super::{Point, PointWriter};
use crate::config::InfluxDbConfig;
use crate::error::{ConnectionError, WriteError};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Buffers points and sends them in one batch on flush
pub struct InfluxDbWriter {
    client: Client,
    write_url: Url,
    token: String,
    pending: Vec<Point>,
    closed: bool,
}

impl InfluxDbWriter {
    pub fn new(config: &InfluxDbConfig, user_agent: &str) -> Result<Self, ConnectionError> {
        let write_url = write_url(config)?;

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(100)
            .danger_accept_invalid_certs(config.skip_verify)
            .build()?;

        if config.skip_verify {
            warn!("TLS certificate verification disabled for InfluxDB");
        }

        debug!("InfluxDB write endpoint: {}", write_url);

        Ok(Self {
            client,
            write_url,
            token: config.token.clone(),
            pending: Vec::new(),
            closed: false,
        })
    }
}

/// `<url>/api/v2/write?org=..&bucket=..&precision=ns`
fn write_url(config: &InfluxDbConfig) -> Result<Url, ConnectionError> {
    let invalid = |reason: &str| ConnectionError::InvalidUrl {
        url: config.url.clone(),
        reason: reason.to_string(),
    };

    let mut url = Url::parse(&config.url).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }

    url.path_segments_mut()
        .map_err(|_| invalid("not a base url"))?
        .pop_if_empty()
        .extend(["api", "v2", "write"]);

    url.query_pairs_mut()
        .clear()
        .append_pair("org", &config.org)
        .append_pair("bucket", &config.bucket)
        .append_pair("precision", "ns");

    Ok(url)
}

#[async_trait]
impl PointWriter for InfluxDbWriter {
    fn write_point(&mut self, point: Point) {
        if self.closed {
            warn!("InfluxDB writer closed, dropping point {}", point.measurement);
            return;
        }
        self.pending.push(point);
    }

    async fn flush(&mut self) -> Result<(), WriteError> {
        let lines: Vec<String> = self
            .pending
            .iter()
            .filter_map(|point| {
                let line = point.to_line_protocol();
                if line.is_none() {
                    warn!("Point {} has no valid field, skipping", point.measurement);
                }
                line
            })
            .collect();

        if lines.is_empty() {
            self.pending.clear();
            return Ok(());
        }

        let response = self
            .client
            .post(self.write_url.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(lines.join("\n"))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Rejected {
                points: lines.len(),
                status: status.as_u16(),
                body,
            });
        }

        debug!("Flushed {} points to InfluxDB", lines.len());
        self.pending.clear();
        Ok(())
    }

    async fn close(&mut self) {
        if !self.pending.is_empty() {
            warn!("Closing InfluxDB writer with {} unflushed points", self.pending.len());
        }
        self.pending.clear();
        self.closed = true;
        debug!("InfluxDB writer closed");
    }
}
