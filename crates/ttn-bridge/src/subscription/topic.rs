// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

/// Application and device parsed from an uplink topic.
#[derive(Debug, Clone, PartialEq)]
pub struct UplinkTopic {
    pub application_id: String,
    pub device_id: String,
}

/// Parse a topic in the format `{application_id}/devices/{device_id}/up`.
///
/// # Examples
/// ```
/// use ttn_bridge::subscription::parse_uplink_topic;
///
/// let parsed = parse_uplink_topic("fr_co2ampel_hft/devices/co2ampelbndlg_dev01/up").unwrap();
/// assert_eq!(parsed.application_id, "fr_co2ampel_hft");
/// assert_eq!(parsed.device_id, "co2ampelbndlg_dev01");
/// ```
pub fn parse_uplink_topic(topic: &str) -> Option<UplinkTopic> {
    let parts: Vec<&str> = topic.split('/').collect();

    match parts.as_slice() {
        [app, "devices", device, "up"] if !app.is_empty() && !device.is_empty() => {
            Some(UplinkTopic {
                application_id: app.to_string(),
                device_id: device.to_string(),
            })
        }
        _ => None,
    }
}

/// Check that `filter` is a well-formed MQTT topic filter.
///
/// `+` must occupy a whole level; `#` must occupy the whole last level.
pub fn validate_topic_filter(filter: &str) -> Result<(), String> {
    if filter.is_empty() {
        return Err("topic filter cannot be empty".to_string());
    }

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    for (i, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || i != last) {
            return Err("'#' must be the whole last level".to_string());
        }
        if level.contains('+') && *level != "+" {
            return Err("'+' must be a whole level".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uplink_topic() {
        let parsed = parse_uplink_topic("fr_co2ampel_hft/devices/co2ampelbndlg_dev01/up")
            .expect("uplink topic");
        assert_eq!(parsed.application_id, "fr_co2ampel_hft");
        assert_eq!(parsed.device_id, "co2ampelbndlg_dev01");
    }

    #[test]
    fn test_parse_rejects_other_topics() {
        assert!(parse_uplink_topic("app/devices/dev/down").is_none());
        assert!(parse_uplink_topic("app/devices/dev/events/activations").is_none());
        assert!(parse_uplink_topic("app/devices//up").is_none());
        assert!(parse_uplink_topic("/devices/dev/up").is_none());
        assert!(parse_uplink_topic("").is_none());
    }

    #[test]
    fn test_validate_topic_filter() {
        assert!(validate_topic_filter("+/devices/+/up").is_ok());
        assert!(validate_topic_filter("app/devices/#").is_ok());
        assert!(validate_topic_filter("#").is_ok());

        assert!(validate_topic_filter("").is_err());
        assert!(validate_topic_filter("app/#/up").is_err());
        assert!(validate_topic_filter("app/dev+/up").is_err());
        assert!(validate_topic_filter("app/devices/x#").is_err());
    }
}
