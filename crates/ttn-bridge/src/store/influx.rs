// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB 1.x HTTP client.
//!
//! - `POST /query` with `q=CREATE DATABASE "<db>"` (a no-op when it exists)
//! - `POST /write?db=<db>&precision=ns` with one Line Protocol line per reading

use super::{PointStore, StoreError, WriteError};
use crate::config::StoreConfig;
use crate::line_protocol::encode_reading;
use crate::reading::Reading;
use crate::retry::RetryPolicy;
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Store writer backed by the InfluxDB 1.x HTTP API.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    http: Client,
    query_url: Url,
    write_url: Url,
    database: String,
    username: Option<String>,
    password: Option<String>,
    retry: RetryPolicy,
}

impl InfluxClient {
    /// Build a client for `config.url` / `config.database`.
    ///
    /// No request is sent; reachability is discovered by
    /// [`PointStore::ensure_database`].
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut base = Url::parse(&config.url)
            .map_err(|e| StoreError::Config(format!("invalid url '{}': {}", config.url, e)))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let query_url = base
            .join("query")
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let mut write_url = base
            .join("write")
            .map_err(|e| StoreError::Config(e.to_string()))?;
        write_url
            .query_pairs_mut()
            .append_pair("db", &config.database)
            .append_pair("precision", "ns");

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            query_url,
            write_url,
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Target database.
    pub fn database(&self) -> &str {
        &self.database
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    async fn send_line(&self, line: &str) -> Result<(), WriteError> {
        let response = self
            .authorize(self.http.post(self.write_url.clone()))
            .body(line.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_write_failure(status.as_u16(), &body))
    }
}

impl PointStore for InfluxClient {
    async fn ensure_database(&self, name: &str) -> Result<(), StoreError> {
        let statement = format!(
            "CREATE DATABASE \"{}\"",
            name.replace('\\', "\\\\").replace('"', "\\\"")
        );

        let response = self
            .authorize(self.http.post(self.query_url.clone()))
            .form(&[("q", statement.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                reason: error_reason(&body),
            });
        }

        // Statement errors come back inside a 200 response.
        if let Some(reason) = statement_error(&body) {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        info!(database = name, "database ready");
        Ok(())
    }

    async fn write_point(&self, reading: &Reading) -> Result<(), WriteError> {
        let line = encode_reading(reading)?;
        debug!(line = %line, "writing point");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_line(&line).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && self.retry.allows_retry(attempt) => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Map a failed `/write` response to a [`WriteError`].
///
/// InfluxDB answers a type clash with
/// `400 {"error":"partial write: field type conflict: ..."}`.
pub fn classify_write_failure(status: u16, body: &str) -> WriteError {
    let reason = error_reason(body);
    if status == 400 && reason.contains("field type conflict") {
        WriteError::SchemaConflict(reason)
    } else {
        WriteError::Rejected { status, reason }
    }
}

fn error_reason(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    if let Some(error) = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| e.as_str())
    {
        return error.to_string();
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no reason given".to_string()
    } else {
        trimmed.to_string()
    }
}

fn statement_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("results")?
        .as_array()?
        .iter()
        .find_map(|r| r.get("error").and_then(|e| e.as_str()))
        .map(str::to_string)
}
