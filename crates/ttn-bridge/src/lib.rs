// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TTN uplink to InfluxDB bridge
//!
//! Subscribes to the uplink feed of a The Things Network (v2) application and
//! stores every CO2 sensor reading as one point in an InfluxDB 1.x series.
//!
//! This crate provides:
//! - Envelope decoding and extraction of the `co2`, `hum` and `tmp` fields
//! - Normalization of every reading field to float
//! - A subscription manager that renews its subscription on every reconnect
//! - An InfluxDB 1.x client speaking Line Protocol
//! - A read client for the network's storage integration
//!
//! # Overview
//!
//! ```text
//! MQTT publish --> extract --> normalize --> Reading --> encode_reading --> POST /write
//! ```
//!
//! Field types of a series are frozen by its first write, so readings are
//! always written as floats even when the device sends whole numbers.

pub mod bridge;
pub mod config;
pub mod envelope;
pub mod history;
pub mod line_protocol;
pub mod normalize;
pub mod reading;
pub mod retry;
pub mod store;
pub mod subscription;

pub use bridge::{Bridge, BridgeError, BridgeStats, MessageHandler};
pub use config::BridgeConfig;
pub use reading::Reading;
pub use retry::RetryPolicy;
pub use store::{InfluxClient, MemoryStore, PointStore};
pub use subscription::{MqttTransport, SubscriptionManager};
