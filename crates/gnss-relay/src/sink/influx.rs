// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB 1.x HTTP client.
//!
//! Points are sent as a newline-joined Line Protocol body:
//!
//! ```text
//! POST {url}/write?db=Tracking&rp=location_2y&precision=s
//!
//! battery percentage=87 1496318400
//! location,session_id=abc123 latitude=47.6062,longitude=-122.3321,geohash="c23nb62qp",elevation=10.5,speed=3.2 1496318401
//! ```

use super::{PointStore, WriteError, WriteOptions};
use crate::config::InfluxDbConfig;
use crate::point::StoragePoint;
use reqwest::Client;
use std::time::Duration;

/// InfluxDB write client.
#[derive(Debug, Clone)]
pub struct InfluxDb {
    url: String,
    database: String,
    auth: Option<(String, String)>,
    client: Client,
}

impl InfluxDb {
    /// Create a client from connection settings.
    pub fn from_config(config: &InfluxDbConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let auth = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            url: config.url.trim_end_matches('/').to_string(),
            database: config.database.clone(),
            auth,
            client,
        })
    }

    /// Target database.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Check that the server answers `/ping`.
    ///
    /// Transport failures count as unreachable rather than errors.
    pub async fn ping(&self) -> bool {
        let url = format!("{}/ping", self.url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!("InfluxDB ping failed: {}", e);
                false
            }
        }
    }
}

impl PointStore for InfluxDb {
    async fn write_batch(
        &self,
        points: &[StoragePoint],
        options: &WriteOptions,
    ) -> Result<(), WriteError> {
        let body = render_body(points)?;
        if body.is_empty() {
            return Ok(());
        }

        let url = format!("{}/write", self.url);
        let mut request = self.client.post(&url).query(&[
            ("db", self.database.as_str()),
            ("rp", options.retention_policy.as_str()),
            ("precision", options.precision.as_str()),
        ]);
        if let Some((user, pass)) = &self.auth {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WriteError::Rejected {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        tracing::debug!(
            "Wrote {} point(s) to {}.{}",
            points.len(),
            self.database,
            options.retention_policy
        );
        Ok(())
    }
}

fn render_body(points: &[StoragePoint]) -> Result<String, WriteError> {
    let mut lines = Vec::with_capacity(points.len());
    for point in points {
        let line = point
            .to_line_protocol()
            .ok_or_else(|| WriteError::NoFields(point.measurement.clone()))?;
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
