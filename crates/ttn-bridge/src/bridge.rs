// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Feed → decode → normalize → write.
//!
//! One task, one message at a time, in arrival order. A slow write delays
//! the next poll of the feed; uplinks arrive minutes apart per device.

use crate::envelope::{extract, DecodeError};
use crate::normalize::normalize;
use crate::store::{PointStore, StoreError, WriteError};
use crate::subscription::{
    parse_uplink_topic, ConnectionError, FeedTransport, RawMessage, SubscriptionManager,
};
use std::fmt;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, error, field, info, info_span, warn, Instrument};

/// Errors that stop the bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("feed error: {0}")]
    Feed(#[from] ConnectionError),
}

/// Why a single message produced no point. Never stops the bridge.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("dropped undecodable uplink: {0}")]
    Decode(#[from] DecodeError),

    #[error("reading lost: {0}")]
    Write(#[from] WriteError),
}

/// Per-message entry point. The run loop is its only caller.
pub trait MessageHandler: Send {
    fn handle(
        &mut self,
        message: RawMessage,
    ) -> impl Future<Output = Result<(), MessageError>> + Send;
}

/// Counters kept by the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub received: u64,
    pub written: u64,
    pub decode_errors: u64,
    pub write_errors: u64,
    pub schema_conflicts: u64,
}

impl fmt::Display for BridgeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} received, {} written, {} undecodable, {} write errors ({} schema conflicts)",
            self.received,
            self.written,
            self.decode_errors,
            self.write_errors,
            self.schema_conflicts
        )
    }
}

/// Forwards uplinks from one feed into one series.
pub struct Bridge<S> {
    store: S,
    measurement: String,
    stats: BridgeStats,
}

impl<S: PointStore> Bridge<S> {
    pub fn new(store: S, measurement: impl Into<String>) -> Self {
        Self {
            store,
            measurement: measurement.into(),
            stats: BridgeStats::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Make sure the target database exists. Call once before [`Bridge::run`].
    pub async fn prepare(&self, database: &str) -> Result<(), BridgeError> {
        self.store.ensure_database(database).await?;
        Ok(())
    }

    /// Process messages until `shutdown` resolves or the feed fails fatally.
    ///
    /// The subscription is disconnected on the way out in both cases.
    pub async fn run<T, F>(
        &mut self,
        subscription: &mut SubscriptionManager<T>,
        shutdown: F,
    ) -> Result<(), BridgeError>
    where
        T: FeedTransport,
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        info!(
            topic = %subscription.topic_filter(),
            measurement = %self.measurement,
            "bridge running"
        );

        let result = loop {
            let message = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break Ok(());
                }
                next = subscription.next_message() => match next {
                    Ok(message) => message,
                    Err(e) => break Err(BridgeError::Feed(e)),
                },
            };

            // Failures are logged inside handle(); keep going.
            let _ = self.handle(message).await;
        };

        subscription.shutdown().await;
        info!(stats = %self.stats, "bridge stopped");
        result
    }

    async fn process(
        &mut self,
        message: &RawMessage,
        device_id: Option<String>,
    ) -> Result<(), MessageError> {
        let uplink = extract(&message.payload)?;
        let reading = normalize(uplink, &self.measurement, device_id);

        self.store.write_point(&reading).await?;
        debug!(timestamp = %reading.timestamp, "point written");
        Ok(())
    }
}

impl<S: PointStore> MessageHandler for Bridge<S> {
    async fn handle(&mut self, message: RawMessage) -> Result<(), MessageError> {
        let span = info_span!(
            "uplink",
            topic = %message.topic,
            payload_size = message.payload.len(),
            application_id = field::Empty,
            device_id = field::Empty,
        );

        // Payloads on unexpected topics are still processed.
        let device_id = parse_uplink_topic(&message.topic).map(|topic| {
            span.record("application_id", topic.application_id.as_str());
            span.record("device_id", topic.device_id.as_str());
            topic.device_id
        });

        async {
            self.stats.received += 1;
            let result = self.process(&message, device_id).await;

            match &result {
                Ok(()) => self.stats.written += 1,
                Err(MessageError::Decode(e)) => {
                    self.stats.decode_errors += 1;
                    warn!(error = %e, "dropping malformed uplink");
                }
                Err(MessageError::Write(WriteError::SchemaConflict(reason))) => {
                    self.stats.write_errors += 1;
                    self.stats.schema_conflicts += 1;
                    error!(
                        reason = %reason,
                        "series rejected field types; every write of this field will fail until the series is recreated"
                    );
                }
                Err(MessageError::Write(e)) => {
                    self.stats.write_errors += 1;
                    error!(error = %e, "failed to write reading");
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}
