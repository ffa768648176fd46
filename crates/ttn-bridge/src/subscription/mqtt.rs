// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::{ConnectionError, FeedEvent, FeedTransport, RawMessage};
use crate::config::FeedConfig;
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS, SubAck,
    SubscribeReasonCode,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Default MQTT port.
const DEFAULT_PORT: u16 = 1883;

/// Capacity of the client request channel.
const REQUEST_CAPACITY: usize = 16;

/// MQTT session with the application broker.
///
/// Uses a clean session, so the broker forgets subscriptions on disconnect.
/// The event loop reconnects on the next poll after an error.
pub struct MqttTransport {
    client: AsyncClient,
    eventloop: EventLoop,
    /// Filter of the last subscribe request, reported if the broker rejects it.
    filter: String,
}

impl MqttTransport {
    /// Prepare a session; nothing is sent until the first poll.
    pub fn new(config: &FeedConfig, access_key: &str) -> Result<Self, ConnectionError> {
        let (host, port) = parse_broker_url(&config.broker)?;

        let mut options = MqttOptions::new(&config.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        options.set_clean_session(true);
        options.set_credentials(&config.app_id, access_key);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        Ok(Self {
            client,
            eventloop,
            filter: config.topic.clone(),
        })
    }
}

impl FeedTransport for MqttTransport {
    async fn poll(&mut self) -> Result<FeedEvent, ConnectionError> {
        match self.eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    Ok(FeedEvent::Connected)
                } else {
                    Err(ConnectionError::Refused(format!("{:?}", ack.code)))
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => Ok(FeedEvent::Message(RawMessage {
                topic: publish.topic,
                payload: publish.payload,
            })),
            Ok(Event::Incoming(Packet::SubAck(ack))) => check_suback(&ack, &self.filter),
            Ok(_) => Ok(FeedEvent::Other),
            Err(rumqttc::ConnectionError::ConnectionRefused(code)) => {
                Err(ConnectionError::Refused(format!("{:?}", code)))
            }
            Err(e) => Err(ConnectionError::Transport(e.to_string())),
        }
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), ConnectionError> {
        self.filter = filter.to_string();
        self.client
            .subscribe(filter, QoS::AtMostOnce)
            .await
            .map_err(|e| ConnectionError::Subscribe {
                topic: filter.to_string(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "disconnect request failed");
        }
    }
}

/// A subscription the broker refused leaves the session connected but deaf.
fn check_suback(ack: &SubAck, filter: &str) -> Result<FeedEvent, ConnectionError> {
    if ack
        .return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        warn!(pkid = ack.pkid, topic = %filter, "broker rejected subscription");
        return Err(ConnectionError::Subscribe {
            topic: filter.to_string(),
            reason: "rejected by broker".to_string(),
        });
    }

    debug!(pkid = ack.pkid, "subscription acknowledged");
    Ok(FeedEvent::Other)
}

/// Parse broker URL in format mqtt://host:port or tcp://host:port or host:port
pub fn parse_broker_url(url: &str) -> Result<(String, u16), ConnectionError> {
    let url = url.trim_start_matches("mqtt://");
    let url = url.trim_start_matches("tcp://");

    let parts: Vec<&str> = url.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok((host.to_string(), DEFAULT_PORT)),
        [host, port] if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| {
                ConnectionError::Endpoint(format!("invalid port in broker URL: {}", port))
            })?;
            Ok((host.to_string(), port))
        }
        _ => Err(ConnectionError::Endpoint(format!(
            "invalid broker URL format: {}",
            url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broker_url_with_port() {
        let (host, port) = parse_broker_url("mqtt://eu.thethings.network:1883").unwrap();
        assert_eq!(host, "eu.thethings.network");
        assert_eq!(port, 1883);
    }

    #[test]
    fn test_parse_broker_url_without_scheme() {
        let (host, port) = parse_broker_url("broker.example.org:8883").unwrap();
        assert_eq!(host, "broker.example.org");
        assert_eq!(port, 8883);
    }

    #[test]
    fn test_parse_broker_url_default_port() {
        let (host, port) = parse_broker_url("tcp://eu.thethings.network").unwrap();
        assert_eq!(host, "eu.thethings.network");
        assert_eq!(port, 1883);
    }

    #[test]
    fn test_parse_broker_url_rejects_malformed() {
        assert!(matches!(
            parse_broker_url("mqtt://host:port"),
            Err(ConnectionError::Endpoint(_))
        ));
        assert!(matches!(
            parse_broker_url("mqtt://"),
            Err(ConnectionError::Endpoint(_))
        ));
        assert!(matches!(
            parse_broker_url("a:1:2"),
            Err(ConnectionError::Endpoint(_))
        ));
    }

    #[test]
    fn test_rejected_suback_is_a_subscribe_error() {
        let ack = SubAck {
            pkid: 1,
            return_codes: vec![SubscribeReasonCode::Failure],
        };
        match check_suback(&ack, "+/devices/+/up") {
            Err(e @ ConnectionError::Subscribe { .. }) => {
                assert!(e.is_fatal());
                assert!(e.to_string().contains("+/devices/+/up"));
            }
            other => panic!("expected Subscribe error, got {:?}", other),
        }
    }

    #[test]
    fn test_granted_suback_is_ignored() {
        let ack = SubAck {
            pkid: 1,
            return_codes: vec![SubscribeReasonCode::Success(QoS::AtMostOnce)],
        };
        assert!(matches!(
            check_suback(&ack, "+/devices/+/up"),
            Ok(FeedEvent::Other)
        ));
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let config = FeedConfig {
            broker: "mqtt://127.0.0.1:1".to_string(),
            ..FeedConfig::default()
        };
        assert!(MqttTransport::new(&config, "key").is_ok());
    }
}
