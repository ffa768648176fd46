// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB Line Protocol encoding for readings.
//!
//! Line Protocol format:
//! ```text
//! measurement field1=val1,field2=val2 timestamp_ns
//! ```
//!
//! Readings never carry tags. Float values are written without the `i`
//! suffix, so `co2=1020` is stored as a float, matching `tmp=18.8`.
//!
//! See: <https://docs.influxdata.com/influxdb/v1/write_protocols/line_protocol_reference/>

use crate::reading::Reading;
use thiserror::Error;

/// Reasons a reading cannot be turned into a line.
#[derive(Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("a point needs at least one field")]
    NoFields,

    #[error("field '{0}' is not a finite number")]
    NonFinite(String),

    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
}

/// Value type InfluxDB infers from a field literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Integer,
    String,
    Boolean,
}

impl FieldKind {
    /// Infer the type of a Line Protocol field literal (`18.8`, `42i`, `"x"`, `true`).
    pub fn of_literal(literal: &str) -> Self {
        if literal.starts_with('"') {
            FieldKind::String
        } else if matches!(
            literal,
            "t" | "T" | "true" | "True" | "TRUE" | "f" | "F" | "false" | "False" | "FALSE"
        ) {
            FieldKind::Boolean
        } else if literal.ends_with('i') || literal.ends_with('u') {
            FieldKind::Integer
        } else {
            FieldKind::Float
        }
    }
}

/// Convert an RFC 3339 timestamp to nanoseconds since the Unix epoch.
pub fn timestamp_nanos(rfc3339: &str) -> Result<i64, EncodeError> {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .ok()
        .and_then(|t| t.timestamp_nanos_opt())
        .ok_or_else(|| EncodeError::Timestamp(rfc3339.to_string()))
}

/// Encode a reading as a single Line Protocol line.
pub fn encode_reading(reading: &Reading) -> Result<String, EncodeError> {
    let timestamp_ns = timestamp_nanos(&reading.timestamp)?;
    encode_point(
        &reading.measurement,
        reading.fields.iter().map(|(k, v)| (k.as_str(), *v)),
        timestamp_ns,
    )
}

/// Encode one point with float fields.
pub fn encode_point<'a>(
    measurement: &str,
    fields: impl IntoIterator<Item = (&'a str, f64)>,
    timestamp_ns: i64,
) -> Result<String, EncodeError> {
    let mut line = escape_measurement(measurement);

    // Space separator before fields
    line.push(' ');

    let mut count = 0;
    for (key, value) in fields {
        if !value.is_finite() {
            return Err(EncodeError::NonFinite(key.to_string()));
        }
        if count > 0 {
            line.push(',');
        }
        line.push_str(&escape_field_key(key));
        line.push('=');
        line.push_str(&format!("{}", value));
        count += 1;
    }

    if count == 0 {
        return Err(EncodeError::NoFields);
    }

    // Space separator before timestamp
    line.push(' ');
    line.push_str(&timestamp_ns.to_string());

    Ok(line)
}

/// Split a line into measurement, `(field, literal)` pairs and timestamp.
///
/// Only understands the tag-less lines produced by [`encode_point`].
pub fn parse_line(line: &str) -> Option<(String, Vec<(String, String)>, i64)> {
    let (head, timestamp) = line.rsplit_once(' ')?;
    let timestamp = timestamp.parse().ok()?;

    let split = find_unescaped(head, ' ')?;
    let measurement = unescape(&head[..split]);
    let field_set = &head[split + 1..];

    let mut fields = Vec::new();
    for pair in field_set.split(',') {
        let eq = find_unescaped(pair, '=')?;
        fields.push((unescape(&pair[..eq]), pair[eq + 1..].to_string()));
    }

    Some((measurement, fields, timestamp))
}

/// Escape a measurement name for Line Protocol.
/// Spaces and commas must be escaped with backslash.
fn escape_measurement(s: &str) -> String {
    s.replace(',', "\\,").replace(' ', "\\ ")
}

/// Escape a field key for Line Protocol.
/// Commas, equals signs, and spaces must be escaped.
fn escape_field_key(s: &str) -> String {
    s.replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn find_unescaped(s: &str, needle: char) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == needle {
            return Some(i);
        }
    }
    None
}

fn unescape(s: &str) -> String {
    s.replace("\\,", ",").replace("\\=", "=").replace("\\ ", " ")
}
