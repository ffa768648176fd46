// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Numeric normalization.
//!
//! Device encoders emit `37` when a humidity happens to be whole and `37.5`
//! otherwise. The store freezes a field's type on the first write to a series
//! and rejects every later write with a different type (`field type
//! conflict`), so every value is widened to `f64` before it reaches a
//! [`Reading`].

use crate::envelope::Uplink;
use crate::reading::{Reading, FIELD_CO2, FIELD_HUM, FIELD_TMP};
use serde_json::Number;
use std::collections::BTreeMap;

/// Total conversion to the single numeric type stored in a series.
pub trait Normalize {
    fn to_float(&self) -> f64;
}

impl Normalize for f64 {
    fn to_float(&self) -> f64 {
        *self
    }
}

impl Normalize for i64 {
    fn to_float(&self) -> f64 {
        *self as f64
    }
}

impl Normalize for u64 {
    fn to_float(&self) -> f64 {
        *self as f64
    }
}

impl Normalize for Number {
    fn to_float(&self) -> f64 {
        // Without `arbitrary_precision` a Number is always one of these three.
        if let Some(u) = self.as_u64() {
            u.to_float()
        } else if let Some(i) = self.as_i64() {
            i.to_float()
        } else {
            self.as_f64().unwrap_or_default()
        }
    }
}

/// Build the store-ready reading for one uplink.
pub fn normalize(uplink: Uplink, measurement: &str, device_id: Option<String>) -> Reading {
    let mut fields = BTreeMap::new();
    fields.insert(FIELD_CO2.to_string(), uplink.co2.to_float());
    fields.insert(FIELD_HUM.to_string(), uplink.hum.to_float());
    fields.insert(FIELD_TMP.to_string(), uplink.tmp.to_float());

    Reading {
        measurement: measurement.to_string(),
        timestamp: uplink.time,
        fields,
        device_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(text: &str) -> Number {
        serde_json::from_str(text).expect("json number")
    }

    #[test]
    fn test_integers_become_floats() {
        assert_eq!(number("1020").to_float(), 1020.0);
        assert_eq!(number("0").to_float(), 0.0);
        assert_eq!(number("-12").to_float(), -12.0);
    }

    #[test]
    fn test_floats_pass_through() {
        assert_eq!(number("18.8").to_float(), 18.8);
        assert_eq!(number("-0.5").to_float(), -0.5);
        assert_eq!(number("1e3").to_float(), 1000.0);
    }

    #[test]
    fn test_extreme_magnitudes_are_finite() {
        for text in ["18446744073709551615", "-9223372036854775808", "1.7976931348623157e308"] {
            let value = number(text).to_float();
            assert!(value.is_finite(), "{} -> {}", text, value);
        }
        assert_eq!(number("18446744073709551615").to_float(), u64::MAX as f64);
        assert_eq!(number("-9223372036854775808").to_float(), i64::MIN as f64);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for text in ["38", "37.5", "-4", "0", "0.0", "123456789012", "2.5e-7"] {
            let once = number(text).to_float();
            let twice = once.to_float();
            assert_eq!(once.to_bits(), twice.to_bits(), "{}", text);

            // Re-normalizing through the wire representation is stable too.
            let reparsed = Number::from_f64(once).expect("finite").to_float();
            assert_eq!(once.to_bits(), reparsed.to_bits(), "{}", text);
        }
    }

    #[test]
    fn test_whole_and_fractional_encodings_agree() {
        assert_eq!(number("38").to_float(), number("38.0").to_float());
    }

    #[test]
    fn test_normalize_builds_reading() {
        let uplink = Uplink {
            time: "2021-03-20T16:20:00.461870801Z".to_string(),
            co2: number("1020"),
            hum: number("37"),
            tmp: number("18.8"),
        };

        let reading = normalize(uplink, "franz-co2", Some("dev01".to_string()));

        assert_eq!(reading.measurement, "franz-co2");
        assert_eq!(reading.timestamp, "2021-03-20T16:20:00.461870801Z");
        assert_eq!(reading.fields.len(), 3);
        assert_eq!(reading.field("co2"), Some(1020.0));
        assert_eq!(reading.field("hum"), Some(37.0));
        assert_eq!(reading.field("tmp"), Some(18.8));
        assert_eq!(reading.device_id.as_deref(), Some("dev01"));
    }
}
