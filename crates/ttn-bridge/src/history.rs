// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Read client for the network's storage integration.
//!
//! The integration keeps a few days of uplinks per device and serves them as
//! a flat, chronological list:
//!
//! ```text
//! GET <base>/<device_id>?last=7d
//! Authorization: key <access key>
//!
//! [{"device_id":"co2ampelbndlg_dev01","co2":460,"hum":29,"tmp":19.4,
//!   "raw":"F5M6","time":"2021-04-06T09:48:40.764357682Z"}, ...]
//! ```
//!
//! Records are only fetched and printed; nothing is written back to the store.

use crate::config::HistoryConfig;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// History query failures.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid window '{0}': expected <n>s, <n>m, <n>h or <n>d")]
    Window(String),

    #[error("invalid query URL: {0}")]
    Url(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("query rejected with status {0}")]
    Status(StatusCode),
}

/// One stored uplink.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryRecord {
    pub device_id: String,
    pub co2: f64,
    pub hum: f64,
    pub tmp: f64,
    /// Nanosecond-precision RFC 3339 string.
    pub time: String,
    #[serde(default)]
    pub raw: Option<String>,
}

/// Parse a query window such as `7d` or `90m`.
pub fn parse_window(window: &str) -> Result<Duration, HistoryError> {
    let invalid = || HistoryError::Window(window.to_string());

    let split = window.len().checked_sub(1).ok_or_else(invalid)?;
    if !window.is_char_boundary(split) {
        return Err(invalid());
    }
    let (amount, unit) = window.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    if amount == 0 {
        return Err(invalid());
    }

    let unit_secs: u64 = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return Err(invalid()),
    };
    let secs = amount.checked_mul(unit_secs).ok_or_else(invalid)?;
    Ok(Duration::from_secs(secs))
}

/// Client for the storage integration query API.
pub struct HistoryClient {
    http: Client,
    base: Url,
    access_key: String,
}

impl HistoryClient {
    pub fn new(
        config: &HistoryConfig,
        app_id: &str,
        access_key: impl Into<String>,
    ) -> Result<Self, HistoryError> {
        let base = config.base_url.clone().unwrap_or_else(|| {
            format!("https://{}.data.thethingsnetwork.org/api/v2/query/", app_id)
        });
        let mut base = Url::parse(&base).map_err(|e| HistoryError::Url(e.to_string()))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base,
            access_key: access_key.into(),
        })
    }

    /// URL queried for `device_id` over the last `window`.
    pub fn query_url(&self, device_id: &str, window: &str) -> Result<Url, HistoryError> {
        parse_window(window)?;
        let mut url = self
            .base
            .join(device_id)
            .map_err(|e| HistoryError::Url(e.to_string()))?;
        url.query_pairs_mut().append_pair("last", window);
        Ok(url)
    }

    /// Fetch the records of `device_id` over the last `window`, oldest first.
    pub async fn query(
        &self,
        device_id: &str,
        window: &str,
    ) -> Result<Vec<HistoryRecord>, HistoryError> {
        let url = self.query_url(device_id, window)?;

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(
                reqwest::header::AUTHORIZATION,
                format!("key {}", self.access_key),
            )
            .send()
            .await?;

        match response.status() {
            // No uplinks in the window.
            StatusCode::NO_CONTENT => Ok(Vec::new()),
            status if status.is_success() => Ok(response.json().await?),
            status => Err(HistoryError::Status(status)),
        }
    }
}
