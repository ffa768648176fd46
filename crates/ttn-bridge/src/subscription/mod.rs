// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Feed subscription management.
//!
//! The broker does not keep subscriptions across a clean-session reconnect,
//! so the manager re-issues the subscription on every connect event,
//! including the first one. Delivery is at-most-once: nothing is acked or
//! replayed, and uplinks published while disconnected are never seen.

mod mqtt;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod topic;

pub use mqtt::{parse_broker_url, MqttTransport};
pub use topic::{parse_uplink_topic, validate_topic_filter, UplinkTopic};

use crate::retry::RetryPolicy;
use bytes::Bytes;
use std::collections::VecDeque;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One inbound publish, as delivered by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl RawMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Event surfaced by a [`FeedTransport`] poll.
#[derive(Debug)]
pub enum FeedEvent {
    /// A session was (re)established.
    Connected,
    /// An application message arrived.
    Message(RawMessage),
    /// Protocol traffic the manager does not act on (acks, pings).
    Other,
}

/// Feed connection failures.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("invalid broker endpoint: {0}")]
    Endpoint(String),

    #[error("broker refused connection: {0}")]
    Refused(String),

    #[error("feed transport error: {0}")]
    Transport(String),

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("gave up after {attempts} reconnect attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<ConnectionError>,
    },
}

impl ConnectionError {
    /// Errors the transport's own reconnect cannot recover from.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ConnectionError::Transport(_))
    }
}

/// Session with the uplink feed.
///
/// `poll` drives the connection: a transport that lost its session
/// reconnects on the next call and reports [`FeedEvent::Connected`] again.
pub trait FeedTransport: Send {
    fn poll(&mut self) -> impl Future<Output = Result<FeedEvent, ConnectionError>> + Send;

    /// Subscribe to `filter` at the lowest delivery quality.
    fn subscribe(
        &mut self,
        filter: &str,
    ) -> impl Future<Output = Result<(), ConnectionError>> + Send;

    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;
}

/// Keeps a live subscription to one topic filter across reconnects.
pub struct SubscriptionManager<T> {
    transport: T,
    topic_filter: String,
    reconnect: RetryPolicy,
    pending: VecDeque<RawMessage>,
    connected: bool,
    connections: u64,
    failures: u32,
}

impl<T: FeedTransport> SubscriptionManager<T> {
    pub fn new(transport: T, topic_filter: impl Into<String>, reconnect: RetryPolicy) -> Self {
        Self {
            transport,
            topic_filter: topic_filter.into(),
            reconnect,
            pending: VecDeque::new(),
            connected: false,
            connections: 0,
            failures: 0,
        }
    }

    pub fn topic_filter(&self) -> &str {
        &self.topic_filter
    }

    /// Number of sessions established (and subscriptions issued) so far.
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Establish the first session and subscribe.
    ///
    /// Any failure here is returned as-is: there is no reconnect policy
    /// before the feed has been reached once.
    pub async fn connect(&mut self) -> Result<(), ConnectionError> {
        loop {
            match self.transport.poll().await? {
                FeedEvent::Connected => return self.on_connected().await,
                FeedEvent::Message(message) => self.pending.push_back(message),
                FeedEvent::Other => {}
            }
        }
    }

    /// Wait for the next message, in transport order.
    ///
    /// Lost sessions are retried according to the reconnect policy; only
    /// fatal or exhausted errors are returned.
    pub async fn next_message(&mut self) -> Result<RawMessage, ConnectionError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }

        loop {
            match self.transport.poll().await {
                Ok(FeedEvent::Connected) => self.on_connected().await?,
                Ok(FeedEvent::Message(message)) => return Ok(message),
                Ok(FeedEvent::Other) => {}
                Err(e) => self.on_transport_error(e).await?,
            }
        }
    }

    /// Disconnect cleanly if a session is up.
    pub async fn shutdown(&mut self) {
        if self.connected {
            self.transport.disconnect().await;
            self.connected = false;
            info!("disconnected from feed");
        }
    }

    async fn on_connected(&mut self) -> Result<(), ConnectionError> {
        if self.connections == 0 {
            info!("connected to feed");
        } else {
            info!(
                after_failures = self.failures,
                "reconnected to feed, renewing subscription"
            );
        }

        self.connected = true;
        self.connections += 1;
        self.failures = 0;

        self.transport.subscribe(&self.topic_filter).await?;
        info!(topic = %self.topic_filter, "subscribed");
        Ok(())
    }

    async fn on_transport_error(&mut self, error: ConnectionError) -> Result<(), ConnectionError> {
        self.connected = false;
        if error.is_fatal() {
            return Err(error);
        }

        self.failures += 1;
        if !self.reconnect.allows_retry(self.failures) {
            return Err(ConnectionError::Exhausted {
                attempts: self.failures,
                last: Box::new(error),
            });
        }

        let delay = self.reconnect.delay_after(self.failures);
        warn!(
            attempt = self.failures,
            max_attempts = self.reconnect.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "feed connection lost, reconnecting"
        );
        tokio::time::sleep(delay).await;
        debug!("polling feed again");
        Ok(())
    }
}
