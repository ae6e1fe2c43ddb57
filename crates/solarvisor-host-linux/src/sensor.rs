//! HTTP voltage sensor
//!
//! The sensor endpoint returns newline-delimited `key|value` records, e.g.
//!
//! ```text
//! Output Voltage|52.7
//! Output Current|3.1
//! ```

use async_trait::async_trait;
use reqwest::Client;
use solarvisor_host_api::{HostError, HostResult, VoltageSource};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Voltage source backed by an HTTP endpoint
pub struct HttpVoltageSource {
    client: Client,
    url: String,
}

impl HttpVoltageSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> HostResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| HostError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl VoltageSource for HttpVoltageSource {
    async fn fetch_fields(&self) -> HostResult<HashMap<String, String>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HostError::Sensor(format!("GET {}: {}", self.url, e)))?;

        let body = response
            .text()
            .await
            .map_err(|e| HostError::Sensor(format!("reading body from {}: {}", self.url, e)))?;

        let fields = parse_fields(&body);
        debug!(url = %self.url, field_count = fields.len(), "Sensor payload fetched");
        Ok(fields)
    }
}

/// Parse `key|value` lines. Lines with fewer than two cells are skipped and
/// later duplicates replace earlier ones.
pub fn parse_fields(body: &str) -> HashMap<String, String> {
    body.lines()
        .filter_map(|line| {
            let mut cells = line.split('|');
            match (cells.next(), cells.next()) {
                (Some(key), Some(value)) => Some((key.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}
