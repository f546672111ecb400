// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! `rumqttc` transport
//!
//! Uses the synchronous client. The event loop runs inside
//! [`BrokerLink::poll`], so no background thread is needed and the
//! session keeps control of every wait.

use crate::error::LinkError;
use crate::link::{BrokerLink, ConnectOptions, LinkEvent};
use log::{debug, trace};
use rumqttc::{
    Client, ClientError, Connection, ConnectionError, Event, LastWill, MqttOptions, Packet, QoS,
    RecvTimeoutError, TlsConfiguration, Transport,
};
use std::time::Duration;

/// Default capacity of the client request channel
pub const DEFAULT_REQUEST_CAPACITY: usize = 16;

/// [`BrokerLink`] over a `rumqttc` client
pub struct RumqttLink {
    capacity: usize,
    client: Option<Client>,
    connection: Option<Connection>,
}

impl RumqttLink {
    /// Create a closed link
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REQUEST_CAPACITY)
    }

    /// Create a closed link whose request channel holds `capacity` packets
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            client: None,
            connection: None,
        }
    }

    fn client(&self) -> Result<&Client, LinkError> {
        self.client.as_ref().ok_or(LinkError::NotOpen)
    }
}

impl Default for RumqttLink {
    fn default() -> Self {
        Self::new()
    }
}

/// Translate session options into `rumqttc` options
pub fn mqtt_options(options: &ConnectOptions) -> MqttOptions {
    let broker = &options.broker;
    let mut mqtt = MqttOptions::new(&options.client_id, &broker.host, broker.port);
    mqtt.set_keep_alive(options.keep_alive);
    mqtt.set_clean_session(true);
    if let Some((user, password)) = broker.credentials() {
        mqtt.set_credentials(user, password);
    }
    mqtt.set_last_will(LastWill::new(
        &options.last_will.topic,
        options.last_will.payload.clone(),
        QoS::AtMostOnce,
        options.last_will.retain,
    ));
    if let Some(ca) = &options.ca_pem {
        mqtt.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca: ca.clone(),
            alpn: None,
            client_auth: None,
        }));
    }
    mqtt
}

fn map_client_error(error: ClientError) -> LinkError {
    match error {
        ClientError::TryRequest(_) => LinkError::Busy,
        ClientError::Request(_) => LinkError::NotOpen,
    }
}

fn map_connection_error(error: ConnectionError) -> LinkError {
    match error {
        ConnectionError::ConnectionRefused(code) => LinkError::Refused(format!("{:?}", code)),
        ConnectionError::Tls(e) => LinkError::Tls(e.to_string()),
        other => LinkError::Transport(other.to_string()),
    }
}

impl BrokerLink for RumqttLink {
    fn open(&mut self, options: &ConnectOptions) -> Result<(), LinkError> {
        self.close();
        let (client, connection) = Client::new(mqtt_options(options), self.capacity);
        debug!(
            "rumqttc client created for {}:{}",
            options.broker.host, options.broker.port
        );
        self.client = Some(client);
        self.connection = Some(connection);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, LinkError> {
        let connection = self.connection.as_mut().ok_or(LinkError::NotOpen)?;
        match connection.recv_timeout(timeout) {
            Ok(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                trace!("CONNACK {:?}", ack.code);
                Ok(Some(LinkEvent::ConnAck))
            }
            Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => Ok(Some(LinkEvent::Message {
                topic: publish.topic,
                payload: publish.payload.to_vec(),
            })),
            Ok(Ok(event)) => {
                trace!("MQTT event {:?}", event);
                Ok(None)
            }
            Ok(Err(e)) => {
                let error = map_connection_error(e);
                self.close();
                Err(error)
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.close();
                Err(LinkError::Transport("event loop stopped".to_string()))
            }
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        self.client()?
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .map_err(map_client_error)
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError> {
        self.client()?
            .try_subscribe(filter, QoS::AtMostOnce)
            .map_err(map_client_error)
    }

    fn close(&mut self) {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                trace!("Disconnect not queued: {}", e);
            }
        }
        self.connection = None;
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrokerConfig;
    use crate::link::LastWill as Will;

    fn options() -> ConnectOptions {
        ConnectOptions {
            client_id: "02:00:00:00:00:01".to_string(),
            broker: BrokerConfig::new("broker.local", 1883).with_credentials("gw", "secret"),
            keep_alive: Duration::from_secs(15),
            last_will: Will {
                topic: "eiot/gateway/status".to_string(),
                payload: b"offline".to_vec(),
                retain: true,
            },
            ca_pem: None,
        }
    }

    #[test]
    fn test_options_translation() {
        let mqtt = mqtt_options(&options());
        assert_eq!(mqtt.client_id(), "02:00:00:00:00:01");
        assert_eq!(mqtt.broker_address(), ("broker.local".to_string(), 1883));
        assert_eq!(mqtt.keep_alive(), Duration::from_secs(15));

        let will = mqtt.last_will().unwrap();
        assert_eq!(will.topic, "eiot/gateway/status");
        assert_eq!(&will.message[..], b"offline");
        assert!(will.retain);
        assert_eq!(will.qos, QoS::AtMostOnce);
    }

    #[test]
    fn test_closed_link() {
        let mut link = RumqttLink::new();
        assert!(!link.is_open());
        assert_eq!(link.publish("t", b"", false), Err(LinkError::NotOpen));
        assert_eq!(link.poll(Duration::ZERO), Err(LinkError::NotOpen));
    }
}
