// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bridge configuration.
//!
//! Loaded from TOML; every key has a default matching the production
//! deployment, so an empty file is a valid configuration. Secrets (the
//! application access key) are normally supplied through the environment.

use crate::reading::DEFAULT_MEASUREMENT;
use crate::retry::RetryPolicy;
use crate::subscription::validate_topic_filter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Uplink feed (MQTT broker).
    #[serde(default)]
    pub feed: FeedConfig,

    /// Time-series store (InfluxDB).
    #[serde(default)]
    pub store: StoreConfig,

    /// Storage integration query API, used by `ttn-bridge history`.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Feed connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Broker URL (`mqtt://host:port`, `tcp://host:port` or `host[:port]`).
    #[serde(default = "default_broker")]
    pub broker: String,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Application id, used as the MQTT username.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Application access key, used as the MQTT password.
    /// Prefer the `TTNPASSWD` environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Topic filter for uplinks.
    #[serde(default = "default_topic")]
    pub topic: String,

    /// MQTT keep-alive (seconds).
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    /// Consecutive reconnect attempts before giving up.
    #[serde(default = "default_reconnect")]
    pub reconnect: RetryPolicy,
}

fn default_broker() -> String {
    "mqtt://eu.thethings.network:1883".to_string()
}

fn default_client_id() -> String {
    "client1".to_string()
}

fn default_app_id() -> String {
    "fr_co2ampel_hft".to_string()
}

fn default_topic() -> String {
    "+/devices/+/up".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_reconnect() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 10,
        initial_backoff_ms: 1_000,
        max_backoff_ms: 60_000,
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            client_id: default_client_id(),
            app_id: default_app_id(),
            access_key: None,
            topic: default_topic(),
            keep_alive_secs: default_keep_alive_secs(),
            reconnect: default_reconnect(),
        }
    }
}

/// Store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// InfluxDB base URL.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Database created at startup and written to.
    #[serde(default = "default_database")]
    pub database: String,

    /// Measurement every reading is written to.
    #[serde(default = "default_measurement")]
    pub measurement: String,

    #[serde(default = "default_credential")]
    pub username: Option<String>,

    #[serde(default = "default_credential")]
    pub password: Option<String>,

    /// HTTP request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry policy for transient write failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_store_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_database() -> String {
    "loradb".to_string()
}

fn default_measurement() -> String {
    DEFAULT_MEASUREMENT.to_string()
}

fn default_credential() -> Option<String> {
    Some("root".to_string())
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            database: default_database(),
            measurement: default_measurement(),
            username: default_credential(),
            password: default_credential(),
            timeout_secs: default_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Storage integration query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Query API base. Defaults to
    /// `https://<app_id>.data.thethingsnetwork.org/api/v2/query/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Device queried when none is given on the command line.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Default time window (`<n>s|m|h|d`).
    #[serde(default = "default_last")]
    pub last: String,
}

fn default_device_id() -> String {
    "co2ampelbndlg_dev01".to_string()
}

fn default_last() -> String {
    "7d".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            device_id: default_device_id(),
            last: default_last(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.app_id.is_empty() {
            return Err(ConfigError::Invalid("feed.app_id is empty".into()));
        }
        if self.feed.client_id.is_empty() {
            return Err(ConfigError::Invalid("feed.client_id is empty".into()));
        }
        validate_topic_filter(&self.feed.topic).map_err(|e| {
            ConfigError::Invalid(format!("feed.topic '{}': {}", self.feed.topic, e))
        })?;
        if self.feed.keep_alive_secs < 5 {
            return Err(ConfigError::Invalid(
                "feed.keep_alive_secs must be at least 5".into(),
            ));
        }
        if self.feed.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "feed.reconnect.max_attempts must be at least 1".into(),
            ));
        }

        if reqwest::Url::parse(&self.store.url).is_err() {
            return Err(ConfigError::Invalid(format!(
                "store.url '{}' is not a URL",
                self.store.url
            )));
        }
        if self.store.database.is_empty() {
            return Err(ConfigError::Invalid("store.database is empty".into()));
        }
        if self.store.measurement.is_empty() {
            return Err(ConfigError::Invalid("store.measurement is empty".into()));
        }
        if self.store.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "store.retry.max_attempts must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as commented TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        let body = toml::to_string_pretty(self)?;
        Ok(format!(
            "# ttn-bridge configuration\n\
             # The feed access key is read from TTNPASSWD, the history key from ACCESSKEY.\n\n{}",
            body
        ))
    }
}
