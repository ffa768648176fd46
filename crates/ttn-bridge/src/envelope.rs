// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Uplink envelope decoding.
//!
//! An uplink published by the application broker looks like:
//!
//! ```text
//! {"app_id":"fr_co2ampel_hft","dev_id":"co2ampelbndlg_dev01","port":1,
//!  "payload_fields":{"co2":1020,"hum":37,"tmp":18.8},
//!  "metadata":{"time":"2021-03-20T16:20:00.461870801Z","frequency":868.1,...}}
//! ```
//!
//! Only `metadata.time` and `payload_fields.{co2,hum,tmp}` are consumed;
//! everything else is ignored.

use serde::Deserialize;
use serde_json::Number;
use thiserror::Error;

/// Per-message decode failure. Never fatal for the pipeline.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid metadata.time '{time}': {source}")]
    Timestamp {
        time: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Deserialize)]
struct Envelope {
    metadata: Metadata,
    payload_fields: PayloadFields,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    time: String,
}

#[derive(Debug, Deserialize)]
struct PayloadFields {
    co2: Number,
    hum: Number,
    tmp: Number,
}

/// Fields extracted from one uplink, still in their wire representation.
///
/// The numbers keep whatever JSON representation the device encoder picked
/// (`37` or `37.5`); [`crate::normalize`] erases that distinction.
#[derive(Debug, Clone, PartialEq)]
pub struct Uplink {
    /// `metadata.time`, untouched.
    pub time: String,
    pub co2: Number,
    pub hum: Number,
    pub tmp: Number,
}

/// Decode a raw uplink payload.
///
/// The timestamp is checked to be RFC 3339 (nanosecond fractions included)
/// but kept byte-for-byte as received.
pub fn extract(payload: &[u8]) -> Result<Uplink, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let envelope: Envelope = serde_json::from_str(text)?;

    let time = envelope.metadata.time;
    if let Err(source) = chrono::DateTime::parse_from_rfc3339(&time) {
        return Err(DecodeError::Timestamp { time, source });
    }

    let fields = envelope.payload_fields;
    Ok(Uplink {
        time,
        co2: fields.co2,
        hum: fields.hum,
        tmp: fields.tmp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{"app_id":"fr_co2ampel_hft","dev_id":"co2ampelbndlg_dev01","hardware_serial":"1111111111111111","port":1,"counter":256,"payload_raw":"M5BK","payload_fields":{"co2":1020,"hum":37,"tmp":18.8},"metadata":{"time":"2021-03-20T16:20:00.461870801Z","frequency":868.1,"modulation":"LORA","data_rate":"SF7BW125","airtime":51456000,"coding_rate":"4/5","gateways":[{"gtw_id":"eui-58a0cbfffe80130d","timestamp":3840645035,"time":"2021-03-20T16:20:00.207355022Z","channel":0,"rssi":-79,"snr":10,"rf_chain":0}]}}"#;

    fn payload(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).expect("serialize fixture")
    }

    #[test]
    fn test_extract_full_uplink() {
        let uplink = extract(SAMPLE.as_bytes()).expect("decode sample");

        assert_eq!(uplink.time, "2021-03-20T16:20:00.461870801Z");
        assert_eq!(uplink.co2, Number::from(1020));
        assert_eq!(uplink.hum, Number::from(37));
        assert_eq!(uplink.tmp.as_f64(), Some(18.8));
    }

    #[test]
    fn test_extract_keeps_time_verbatim() {
        let raw = payload(json!({
            "metadata": { "time": "2021-04-08T18:01:48.206104336+02:00" },
            "payload_fields": { "co2": 900, "hum": 33.5, "tmp": 19.6 }
        }));

        let uplink = extract(&raw).expect("decode");
        assert_eq!(uplink.time, "2021-04-08T18:01:48.206104336+02:00");
    }

    #[test]
    fn test_extract_ignores_extra_fields() {
        let raw = payload(json!({
            "metadata": { "time": "2021-03-20T16:20:00Z", "airtime": 51456000 },
            "payload_fields": { "co2": 1, "hum": 2, "tmp": 3, "bat": 3.3 },
            "counter": 7
        }));

        assert!(extract(&raw).is_ok());
    }

    #[test]
    fn test_extract_rejects_each_missing_field() {
        for missing in ["co2", "hum", "tmp"] {
            let mut fields = json!({ "co2": 1020, "hum": 37, "tmp": 18.8 });
            fields.as_object_mut().expect("object").remove(missing);
            let raw = payload(json!({
                "metadata": { "time": "2021-03-20T16:20:00Z" },
                "payload_fields": fields
            }));

            match extract(&raw) {
                Err(DecodeError::Json(e)) => {
                    assert!(e.to_string().contains(missing), "{}", e)
                }
                other => panic!("expected Json error for {}, got {:?}", missing, other),
            }
        }
    }

    #[test]
    fn test_extract_rejects_missing_payload_fields() {
        let raw = payload(json!({ "metadata": { "time": "2021-03-20T16:20:00Z" } }));
        assert!(matches!(extract(&raw), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_extract_rejects_missing_time() {
        let raw = payload(json!({
            "metadata": { "frequency": 868.1 },
            "payload_fields": { "co2": 1, "hum": 2, "tmp": 3 }
        }));
        assert!(matches!(extract(&raw), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_extract_rejects_non_numeric_field() {
        let raw = payload(json!({
            "metadata": { "time": "2021-03-20T16:20:00Z" },
            "payload_fields": { "co2": "1020", "hum": 37, "tmp": 18.8 }
        }));
        assert!(matches!(extract(&raw), Err(DecodeError::Json(_))));
    }

    #[test]
    fn test_extract_rejects_invalid_json() {
        assert!(matches!(
            extract(b"{\"metadata\": "),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn test_extract_rejects_invalid_utf8() {
        assert!(matches!(
            extract(&[0x7b, 0xff, 0xfe, 0x7d]),
            Err(DecodeError::Utf8(_))
        ));
    }

    #[test]
    fn test_extract_rejects_unparseable_time() {
        let raw = payload(json!({
            "metadata": { "time": "yesterday" },
            "payload_fields": { "co2": 1, "hum": 2, "tmp": 3 }
        }));

        match extract(&raw) {
            Err(DecodeError::Timestamp { time, .. }) => assert_eq!(time, "yesterday"),
            other => panic!("expected Timestamp error, got {:?}", other),
        }
    }
}
