// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Gateway output facade
//!
//! [`GatewayOutput`] is the contract the EnigmaIOT gateway core drives.
//! [`MqttOutput`] implements it over a [`BrokerSession`]: node events are
//! formatted into topics, queued, and published from [`tick`](GatewayOutput::tick).
//! Nothing is ever published from the `*_send` calls themselves.
//!
//! # Example
//!
//! ```rust
//! use enigmaiot::MacAddress;
//! use enigmaiot_gateway::{
//!     BrokerConfig, DataKind, GatewayConfig, GatewayOutput, MemoryLink, MqttOutput,
//! };
//!
//! let gateway: MacAddress = "02:00:00:00:00:01".parse().unwrap();
//! let config = GatewayConfig::new("eiot", gateway)
//!     .with_broker(BrokerConfig::new("localhost", 1883));
//!
//! let broker = MemoryLink::new();
//! let mut output = MqttOutput::new(config, broker.clone());
//! output.begin().unwrap();
//!
//! let node: MacAddress = "AA:BB:CC:11:22:33".parse().unwrap();
//! output.output_data_send(&node, b"hi", DataKind::Data).unwrap();
//! output.tick();
//!
//! let published = broker.published();
//! assert_eq!(published.last().unwrap().topic(), "eiot/AA:BB:CC:11:22:33/data");
//! ```

use crate::clock::{ClockSync, SntpClock};
use crate::command::{ControlResponse, DataKind, DisconnectReason};
use crate::config::{BrokerConfig, GatewayConfig, MAX_HOST_LEN, MAX_PASS_LEN, MAX_USER_LEN};
use crate::error::{ConfigError, GatewayError, LinkError, Result, RouteError};
use crate::link::{BrokerLink, ConnectOptions, LastWill};
use crate::portal::{ConfigPortal, PortalField};
use crate::queue::OutboundQueue;
use crate::session::{BrokerSession, SessionState, SessionStats};
use crate::topics::{Downlink, TopicRouter, GATEWAY_OFFLINE};
use enigmaiot::{hex_dump, MacAddress};
use log::{debug, info, log_enabled, trace, warn, Level};
use serde_json::json;
use std::time::Instant;

/// Portal field for the broker host (same key as in `mqtt.json`)
pub const FIELD_SERVER: &str = "mqtt_server";
/// Portal field for the broker port
pub const FIELD_PORT: &str = "mqtt_port";
/// Portal field for the user name
pub const FIELD_USER: &str = "mqtt_user";
/// Portal field for the password
pub const FIELD_PASS: &str = "mqtt_pass";

/// Handler for inbound downlink commands
pub type DownlinkCallback = Box<dyn FnMut(&Downlink)>;

/// Output contract driven by the gateway core
pub trait GatewayOutput {
    /// Load config and start the broker session. Calling again is a no-op.
    fn begin(&mut self) -> Result<()>;

    /// Drive the session and drain queued records. Never blocks for long.
    fn tick(&mut self);

    /// Register this output's fields on the provisioning portal
    fn config_manager_start(&mut self, portal: &mut dyn ConfigPortal);

    /// Provisioning finished; on success persist the entered values
    fn config_manager_exit(&mut self, status: bool, portal: &dyn ConfigPortal) -> Result<()>;

    /// Queue node data
    fn output_data_send(&mut self, address: &MacAddress, data: &[u8], kind: DataKind)
        -> Result<()>;

    /// Queue a node's control response
    fn output_control_send(&mut self, address: &MacAddress, data: &[u8]) -> Result<()>;

    /// Queue a node-joined announcement
    fn new_node_send(&mut self, address: &MacAddress, node_id: u16) -> Result<()>;

    /// Queue a retained node-disconnected status
    fn node_disconnected_send(&mut self, address: &MacAddress, reason: DisconnectReason)
        -> Result<()>;

    /// Install the handler for inbound commands
    fn set_downlink_callback(&mut self, callback: DownlinkCallback);
}

/// Adapter counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    /// Records handed to the broker
    pub published: u64,
    /// Records refused by the queue
    pub enqueue_failures: u64,
    /// Downlinks handed to the callback
    pub downlinks: u64,
    /// Inbound topics with a bad network or address
    pub parse_errors: u64,
    /// Inbound topics with an unknown command path
    pub unknown_commands: u64,
    /// Inbound payloads cut to the ceiling
    pub truncated: u64,
}

/// MQTT output adapter
pub struct MqttOutput<L: BrokerLink> {
    config: GatewayConfig,
    router: TopicRouter,
    queue: OutboundQueue,
    session: BrokerSession<L>,
    clock: Option<Box<dyn ClockSync>>,
    callback: Option<DownlinkCallback>,
    stats: AdapterStats,
}

impl<L: BrokerLink> MqttOutput<L> {
    /// Create an adapter over `link`. Nothing connects before [`begin`](GatewayOutput::begin).
    pub fn new(config: GatewayConfig, link: L) -> Self {
        Self {
            router: TopicRouter::new(config.network_name.clone(), config.max_inbound_payload),
            queue: OutboundQueue::new(config.queue),
            session: BrokerSession::new(link, config.session.clone()),
            clock: None,
            callback: None,
            stats: AdapterStats::default(),
            config,
        }
    }

    /// Clock used to gate TLS connects; an SNTP client by default
    pub fn with_clock(mut self, clock: Box<dyn ClockSync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Configuration
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Topic router
    pub fn router(&self) -> &TopicRouter {
        &self.router
    }

    /// Session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Pending outbound records
    pub fn queue(&self) -> &OutboundQueue {
        &self.queue
    }

    /// Adapter counters
    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    /// Session counters
    pub fn session_stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// One pump step at an explicit instant
    pub fn tick_at(&mut self, now: Instant) {
        let Self {
            session,
            router,
            callback,
            stats,
            ..
        } = self;
        let state = session.pump(now, &mut |topic, payload| {
            dispatch(router, callback, stats, topic, payload)
        });

        if state == SessionState::Connected && self.session.ready_for_publish() {
            self.drain(self.config.publish_budget);
        }
    }

    /// Flush what the broker accepts, announce `offline` and disconnect.
    /// Records still queued afterwards are discarded.
    pub fn end(&mut self) -> Result<()> {
        if !self.session.is_started() {
            return Err(GatewayError::NotStarted);
        }
        if self.session.ready_for_publish() {
            self.drain(self.queue.len());
        }
        let dropped = self.queue.clear();
        if dropped > 0 {
            warn!("Discarding {} unpublished records on shutdown", dropped);
        }
        self.session.shutdown();
        Ok(())
    }

    fn drain(&mut self, budget: usize) {
        for _ in 0..budget {
            let Some(record) = self.queue.peek() else {
                break;
            };
            match self
                .session
                .publish(record.topic(), record.payload(), record.retain())
            {
                Ok(()) => {
                    self.queue.pop();
                    self.stats.published += 1;
                }
                Err(LinkError::Busy) => {
                    debug!("Link busy, {} records left queued", self.queue.len());
                    break;
                }
                Err(e) => {
                    debug!("Publish failed ({}), keeping record for reconnect", e);
                    break;
                }
            }
        }
    }

    fn enqueue(&mut self, topic: String, payload: &[u8], retain: bool) -> Result<()> {
        if log_enabled!(Level::Trace) {
            trace!("Queueing {}: {}", topic, hex_dump(payload));
        }
        self.queue
            .enqueue(&topic, payload, retain)
            .map_err(|error| {
                self.stats.enqueue_failures += 1;
                warn!("Dropping record for {}: {}", topic, error);
                GatewayError::QueueFull(error)
            })
    }

    fn broker_config(&self) -> Result<BrokerConfig> {
        let broker = match &self.config.broker {
            Some(broker) => broker.clone(),
            None => {
                debug!("Loading broker config from {}", self.config.config_path.display());
                BrokerConfig::load(&self.config.config_path)?
            }
        };
        broker.validate()?;
        Ok(broker)
    }

    fn connect_options(&self, broker: BrokerConfig) -> Result<ConnectOptions> {
        let ca_pem = match &self.config.tls {
            Some(tls) => Some(tls.load_ca()?),
            None => None,
        };
        Ok(ConnectOptions {
            client_id: self.config.gateway_address.to_string(),
            broker,
            keep_alive: self.config.session.keep_alive,
            last_will: LastWill {
                topic: self.router.gateway_status_topic(),
                payload: GATEWAY_OFFLINE.to_vec(),
                retain: true,
            },
            ca_pem,
        })
    }
}

fn dispatch(
    router: &TopicRouter,
    callback: &mut Option<DownlinkCallback>,
    stats: &mut AdapterStats,
    topic: &str,
    payload: &[u8],
) {
    match router.route(topic, payload) {
        Ok(downlink) => {
            if downlink.truncated {
                stats.truncated += 1;
                warn!(
                    "Downlink on {} truncated from {} to {} bytes",
                    topic,
                    payload.len(),
                    downlink.payload.len()
                );
            }
            stats.downlinks += 1;
            debug!("Downlink {} for {}", downlink.command, downlink.address);
            match callback {
                Some(callback) => callback(&downlink),
                None => warn!("No downlink handler installed, dropping {}", topic),
            }
        }
        Err(RouteError::UnknownCommand(command)) => {
            stats.unknown_commands += 1;
            warn!("Unknown downlink command {:?} on {}", command, topic);
        }
        Err(e) => {
            stats.parse_errors += 1;
            warn!("Dropping inbound message: {}", e);
        }
    }
}

impl<L: BrokerLink> GatewayOutput for MqttOutput<L> {
    fn begin(&mut self) -> Result<()> {
        if self.session.is_started() {
            debug!("Output already started ({})", self.session.state());
            return Ok(());
        }
        self.config.validate()?;
        let broker = self.broker_config()?;
        let options = self.connect_options(broker)?;

        if let Some(tls) = &self.config.tls {
            let clock = self.clock.take().unwrap_or_else(|| {
                Box::new(SntpClock::new(tls.ntp_server.clone())) as Box<dyn ClockSync>
            });
            self.session.set_clock(clock, tls.min_valid_year);
        }

        info!(
            "MQTT output for network {} ({})",
            self.config.network_name,
            if self.config.tls_enabled() { "TLS" } else { "plain TCP" }
        );
        self.session
            .start(options, self.router.subscriptions(), Instant::now());
        Ok(())
    }

    fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn config_manager_start(&mut self, portal: &mut dyn ConfigPortal) {
        let current = self
            .config
            .broker
            .clone()
            .or_else(|| BrokerConfig::load(&self.config.config_path).ok());
        let port = current.as_ref().map_or_else(
            || BrokerConfig::default_port(self.config.tls_enabled()),
            |b| b.port,
        );
        let (host, user, password) = current
            .map(|b| (b.host, b.user, b.password))
            .unwrap_or_default();

        portal.add_field(PortalField {
            id: FIELD_SERVER,
            label: "MQTT server",
            default: host,
            max_len: MAX_HOST_LEN,
        });
        portal.add_field(PortalField {
            id: FIELD_PORT,
            label: "MQTT port",
            default: port.to_string(),
            max_len: 5,
        });
        portal.add_field(PortalField {
            id: FIELD_USER,
            label: "MQTT user",
            default: user,
            max_len: MAX_USER_LEN,
        });
        portal.add_field(PortalField {
            id: FIELD_PASS,
            label: "MQTT password",
            default: password,
            max_len: MAX_PASS_LEN,
        });
    }

    fn config_manager_exit(&mut self, status: bool, portal: &dyn ConfigPortal) -> Result<()> {
        if !status {
            info!("Provisioning cancelled, keeping previous broker config");
            return Ok(());
        }

        let value = |id| portal.field_value(id).unwrap_or_default();
        let port_text = value(FIELD_PORT);
        let port = port_text
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort(port_text.clone()))?;
        let broker = BrokerConfig::new(value(FIELD_SERVER).trim(), port)
            .with_credentials(value(FIELD_USER), value(FIELD_PASS));

        broker.save(&self.config.config_path)?;
        info!(
            "Broker config saved to {} ({}:{})",
            self.config.config_path.display(),
            broker.host,
            broker.port
        );
        self.config.broker = Some(broker);
        Ok(())
    }

    fn output_data_send(
        &mut self,
        address: &MacAddress,
        data: &[u8],
        kind: DataKind,
    ) -> Result<()> {
        let topic = self.router.data_topic(address, kind);
        self.enqueue(topic, data, false)
    }

    fn output_control_send(&mut self, address: &MacAddress, data: &[u8]) -> Result<()> {
        let response = ControlResponse::parse(data)?;
        let topic = self.router.control_topic(address, &response);
        self.enqueue(topic, &response.payload(), false)
    }

    fn new_node_send(&mut self, address: &MacAddress, node_id: u16) -> Result<()> {
        let topic = self.router.hello_topic(address);
        let payload = json!({ "node_id": node_id }).to_string();
        self.enqueue(topic, payload.as_bytes(), false)
    }

    fn node_disconnected_send(
        &mut self,
        address: &MacAddress,
        reason: DisconnectReason,
    ) -> Result<()> {
        let topic = self.router.status_topic(address);
        self.enqueue(topic, reason.code().to_string().as_bytes(), true)
    }

    fn set_downlink_callback(&mut self, callback: DownlinkCallback) {
        self.callback = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::error::QueueError;
    use crate::link::MemoryLink;

    fn node() -> MacAddress {
        MacAddress::new([0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33])
    }

    fn output(handle: &MemoryLink) -> MqttOutput<MemoryLink> {
        let config = GatewayConfig::new("eiot", MacAddress::new([2, 0, 0, 0, 0, 1]))
            .with_broker(BrokerConfig::new("localhost", 1883));
        MqttOutput::new(config, handle.clone())
    }

    #[test]
    fn test_sends_only_enqueue() {
        let handle = MemoryLink::new();
        let mut output = output(&handle);
        output.begin().unwrap();
        output
            .output_data_send(&node(), b"hi", DataKind::Data)
            .unwrap();
        assert!(handle.published().is_empty());
        assert_eq!(output.queue().len(), 1);
    }

    #[test]
    fn test_connect_options() {
        let handle = MemoryLink::new();
        let mut output = output(&handle);
        output.begin().unwrap();

        let options = handle.last_options().unwrap();
        assert_eq!(options.client_id, "02:00:00:00:00:01");
        assert_eq!(options.last_will.topic, "eiot/gateway/status");
        assert_eq!(options.last_will.payload, b"offline");
        assert!(options.last_will.retain);
        assert!(options.ca_pem.is_none());
    }

    #[test]
    fn test_control_and_status_payloads() {
        let handle = MemoryLink::new();
        let mut output = output(&handle);
        output
            .output_control_send(&node(), &[0x82, 30, 0, 0, 0])
            .unwrap();
        output.new_node_send(&node(), 7).unwrap();
        output
            .node_disconnected_send(&node(), DisconnectReason::KeyExpired)
            .unwrap();

        let records: Vec<_> = output.queue().iter().cloned().collect();
        assert_eq!(records[0].topic(), "eiot/AA:BB:CC:11:22:33/result/sleeptime");
        assert_eq!(records[0].payload(), br#"{"sleeptime":30}"#);
        assert_eq!(records[1].topic(), "eiot/AA:BB:CC:11:22:33/hello");
        assert_eq!(records[1].payload(), br#"{"node_id":7}"#);
        assert_eq!(records[2].topic(), "eiot/AA:BB:CC:11:22:33/status");
        assert_eq!(records[2].payload(), b"17");
        assert!(records[2].retain());
    }

    #[test]
    fn test_unknown_control_not_queued() {
        let handle = MemoryLink::new();
        let mut output = output(&handle);
        assert!(matches!(
            output.output_control_send(&node(), &[0x42, 1]),
            Err(GatewayError::UnknownControl(0x42))
        ));
        assert!(output.queue().is_empty());
    }

    #[test]
    fn test_short_control_not_queued() {
        let handle = MemoryLink::new();
        let mut output = output(&handle);
        // Sleep answer needs a four byte body
        assert!(matches!(
            output.output_control_send(&node(), &[0x82, 30]),
            Err(GatewayError::ControlTooShort {
                kind: 0x82,
                needed: 5,
                actual: 2
            })
        ));
        assert!(matches!(
            output.output_control_send(&node(), &[]),
            Err(GatewayError::ControlTooShort { .. })
        ));
        assert!(output.queue().is_empty());
        assert_eq!(output.stats().enqueue_failures, 0);
    }

    #[test]
    fn test_queue_full_surfaces() {
        let handle = MemoryLink::new();
        let config = GatewayConfig::new("eiot", MacAddress::new([2, 0, 0, 0, 0, 1]))
            .with_broker(BrokerConfig::new("localhost", 1883))
            .with_queue(QueueConfig {
                max_records: 1,
                max_payload_bytes: 64,
            });
        let mut output = MqttOutput::new(config, handle);
        output
            .output_data_send(&node(), b"a", DataKind::Data)
            .unwrap();
        assert!(matches!(
            output.output_data_send(&node(), b"b", DataKind::Data),
            Err(GatewayError::QueueFull(QueueError::Full { max_records: 1 }))
        ));
        assert_eq!(output.stats().enqueue_failures, 1);
    }

    #[test]
    fn test_end_requires_begin() {
        let handle = MemoryLink::new();
        let mut output = output(&handle);
        assert!(matches!(output.end(), Err(GatewayError::NotStarted)));
    }

    #[test]
    fn test_begin_rejects_bad_network_name() {
        let handle = MemoryLink::new();
        let config = GatewayConfig::new("a/b", MacAddress::default())
            .with_broker(BrokerConfig::new("localhost", 1883));
        let mut output = MqttOutput::new(config, handle.clone());
        assert!(matches!(
            output.begin(),
            Err(GatewayError::Config(ConfigError::InvalidNetworkName(_)))
        ));
        assert_eq!(handle.open_count(), 0);
    }
}
