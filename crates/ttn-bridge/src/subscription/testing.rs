// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scripted feed transport for tests.
//!
//! Built for the crate's own tests and, with the `testing` feature, for
//! integration tests.

use super::{ConnectionError, FeedEvent, FeedTransport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct Record {
    subscriptions: Vec<String>,
    disconnects: usize,
}

/// Observes what the manager asked the transport to do.
#[derive(Debug, Clone, Default)]
pub struct Probe {
    record: Arc<Mutex<Record>>,
}

impl Probe {
    pub fn subscriptions(&self) -> Vec<String> {
        self.record.lock().subscriptions.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.record.lock().disconnects
    }
}

/// Replays a fixed list of poll results, then stays silent forever.
pub struct ScriptedTransport {
    script: VecDeque<Result<FeedEvent, ConnectionError>>,
    probe: Probe,
    drained: Option<oneshot::Sender<()>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Result<FeedEvent, ConnectionError>>) -> (Self, Probe) {
        let probe = Probe::default();
        let transport = Self {
            script: script.into(),
            probe: probe.clone(),
            drained: None,
        };
        (transport, probe)
    }

    /// Resolves once every scripted event has been consumed.
    pub fn on_drained(&mut self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.drained = Some(tx);
        rx
    }
}

impl FeedTransport for ScriptedTransport {
    async fn poll(&mut self) -> Result<FeedEvent, ConnectionError> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        if let Some(tx) = self.drained.take() {
            let _ = tx.send(());
        }
        std::future::pending().await
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), ConnectionError> {
        self.probe.record.lock().subscriptions.push(filter.to_string());
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.probe.record.lock().disconnects += 1;
    }
}
