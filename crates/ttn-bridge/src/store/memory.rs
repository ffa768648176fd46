// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process store used for `--dry-run`.
//!
//! Mirrors the parts of InfluxDB the bridge depends on: idempotent database
//! creation and a per-series field schema frozen by the first write.

use super::{PointStore, StoreError, WriteError};
use crate::line_protocol::{encode_reading, parse_line, FieldKind};
use crate::reading::Reading;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, VecDeque};
use tracing::info;

/// Accepted lines kept by [`MemoryStore::new`].
pub const DEFAULT_RECENT_LINES: usize = 64;

#[derive(Debug, Default)]
struct Inner {
    databases: BTreeSet<String>,
    schema: HashMap<(String, String), FieldKind>,
    recent: VecDeque<String>,
    accepted: u64,
}

/// Store that counts accepted lines and keeps only the most recent ones.
///
/// Memory stays bounded by the schema size plus `recent_capacity` lines, so
/// the store can back a long-running process.
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    recent_capacity: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_recent_capacity(DEFAULT_RECENT_LINES)
    }
}

impl MemoryStore {
    /// Create an empty store keeping the last [`DEFAULT_RECENT_LINES`] lines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store keeping at most `capacity` recent lines.
    pub fn with_recent_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            recent_capacity: capacity,
        }
    }

    /// Number of lines accepted since creation.
    pub fn accepted(&self) -> u64 {
        self.inner.lock().accepted
    }

    /// Databases created so far, sorted.
    pub fn databases(&self) -> Vec<String> {
        self.inner.lock().databases.iter().cloned().collect()
    }

    /// Most recently accepted lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.inner.lock().recent.iter().cloned().collect()
    }

    /// Type frozen for `field` of `measurement`, if it was ever written.
    pub fn field_kind(&self, measurement: &str, field: &str) -> Option<FieldKind> {
        self.inner
            .lock()
            .schema
            .get(&(measurement.to_string(), field.to_string()))
            .copied()
    }

    /// Accept one Line Protocol line, enforcing the frozen field types.
    ///
    /// A line with any conflicting field is dropped as a whole.
    pub fn write_line(&self, line: &str) -> Result<(), WriteError> {
        let (measurement, fields, _) = parse_line(line).ok_or_else(|| WriteError::Rejected {
            status: 400,
            reason: format!("unable to parse '{}'", line),
        })?;

        let mut inner = self.inner.lock();

        for (field, literal) in &fields {
            let kind = FieldKind::of_literal(literal);
            if let Some(existing) = inner.schema.get(&(measurement.clone(), field.clone())) {
                if *existing != kind {
                    return Err(WriteError::SchemaConflict(format!(
                        "input field \"{}\" on measurement \"{}\" is type {:?}, already exists as type {:?}",
                        field, measurement, kind, existing
                    )));
                }
            }
        }

        for (field, literal) in fields {
            inner
                .schema
                .entry((measurement.clone(), field))
                .or_insert_with(|| FieldKind::of_literal(&literal));
        }
        inner.accepted += 1;
        if self.recent_capacity > 0 {
            if inner.recent.len() == self.recent_capacity {
                inner.recent.pop_front();
            }
            inner.recent.push_back(line.to_string());
        }
        Ok(())
    }
}

impl PointStore for MemoryStore {
    async fn ensure_database(&self, name: &str) -> Result<(), StoreError> {
        self.inner.lock().databases.insert(name.to_string());
        Ok(())
    }

    async fn write_point(&self, reading: &Reading) -> Result<(), WriteError> {
        let line = encode_reading(reading)?;
        self.write_line(&line)?;
        info!(line = %line, "point accepted (dry run)");
        Ok(())
    }
}
