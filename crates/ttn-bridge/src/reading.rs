// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Store-ready reading.

use std::collections::BTreeMap;

/// Name of the CO2 concentration field (ppm).
pub const FIELD_CO2: &str = "co2";
/// Name of the relative humidity field (%).
pub const FIELD_HUM: &str = "hum";
/// Name of the temperature field (°C).
pub const FIELD_TMP: &str = "tmp";

/// Default measurement the readings are written to.
pub const DEFAULT_MEASUREMENT: &str = "franz-co2";

/// One normalized point, produced per uplink and consumed once by the writer.
///
/// Field values are `f64` by construction: the series freezes each field's
/// type on its first write, so every write has to carry the same type.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Target series.
    pub measurement: String,

    /// RFC 3339 time string, verbatim from the envelope.
    pub timestamp: String,

    /// Field name to value. Ordered so the encoded line is deterministic.
    pub fields: BTreeMap<String, f64>,

    /// Originating device, when the topic carried one. Diagnostics only.
    pub device_id: Option<String>,
}

impl Reading {
    /// Look up a field value.
    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}
