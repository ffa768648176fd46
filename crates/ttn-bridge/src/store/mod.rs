// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Time-series store writer.
//!
//! The store freezes the type of every field on the first write to a series.
//! Nothing here validates or repairs that schema; the pipeline only ever
//! writes float fields, which is what keeps writes from conflicting.

mod influx;
mod memory;

pub use influx::{classify_write_failure, InfluxClient};
pub use memory::MemoryStore;

use crate::line_protocol::EncodeError;
use crate::reading::Reading;
use thiserror::Error;

/// Failure to reach or prepare the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store configuration: {0}")]
    Config(String),

    #[error("store unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("store rejected request ({status}): {reason}")]
    Rejected { status: u16, reason: String },
}

/// Failure to persist one reading. The reading is lost.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A field's type disagrees with the type frozen on the series' first
    /// write. Retrying cannot fix this.
    #[error("field type conflict: {0}")]
    SchemaConflict(String),

    #[error("write rejected ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("write transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cannot encode reading: {0}")]
    Encode(#[from] EncodeError),
}

impl WriteError {
    /// Transport failures and server-side (5xx) errors are worth another try.
    pub fn is_retryable(&self) -> bool {
        match self {
            WriteError::Transport(_) => true,
            WriteError::Rejected { status, .. } => *status >= 500,
            WriteError::SchemaConflict(_) | WriteError::Encode(_) => false,
        }
    }
}

/// Destination for readings.
///
/// Implementations own their connection; the bridge is the only caller and
/// never calls concurrently.
pub trait PointStore: Send + Sync {
    /// Create the database if it does not exist. Idempotent.
    fn ensure_database(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Persist exactly one point for `reading`.
    fn write_point(
        &self,
        reading: &Reading,
    ) -> impl std::future::Future<Output = Result<(), WriteError>> + Send;
}
