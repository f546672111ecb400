// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EnigmaIOT Gateway - MQTT output adapter
//!
//! This crate bridges an EnigmaIOT gateway to an MQTT v3.1.1 broker.
//!
//! ## Overview
//!
//! Node events coming out of the gateway core (data, control answers,
//! joins and disconnects) are turned into topics under the network name,
//! queued, and published from a cooperative pump. Commands published by
//! the broker on `<network>/<mac>/get/...` and `<network>/<mac>/set/...`
//! are parsed and handed back to the core.
//!
//! ## Features
//!
//! - **Bounded outbound queue**: producers never block, a full queue is reported
//! - **Self-healing session**: reconnect with exponential backoff, queue kept intact
//! - **Retained presence**: `online` on connect, `offline` as last will
//! - **TLS**: pinned CA, connects wait for a synchronized clock
//! - **Provisioning hooks**: broker settings entered through the gateway portal
//!
//! ## Quick Start
//!
//! ```rust
//! use enigmaiot::MacAddress;
//! use enigmaiot_gateway::{
//!     BrokerConfig, Downlink, DownlinkCommand, GatewayConfig, GatewayOutput, MemoryLink,
//!     MqttOutput,
//! };
//!
//! let config = GatewayConfig::new("eiot", MacAddress::new([2, 0, 0, 0, 0, 1]))
//!     .with_broker(BrokerConfig::new("localhost", 1883));
//! let broker = MemoryLink::new();
//! let mut output = MqttOutput::new(config, broker.clone());
//!
//! output.set_downlink_callback(Box::new(|downlink: &Downlink| {
//!     assert_eq!(downlink.command, DownlinkCommand::SetSleep);
//! }));
//! output.begin().unwrap();
//! output.tick();
//!
//! broker.deliver("eiot/AA:BB:CC:11:22:33/set/sleeptime", b"30");
//! output.tick();
//! assert_eq!(output.stats().downlinks, 1);
//! ```
//!
//! ## Architecture
//!
//! ```text
//!  gateway core
//!      │  output_*_send            ▲ downlink callback
//!      ▼                           │
//!  ┌────────────┐  topic   ┌─────────────┐
//!  │ MqttOutput │─────────▶│ TopicRouter │
//!  └─────┬──────┘          └─────────────┘
//!        │ enqueue                 ▲ inbound (topic, payload)
//!        ▼                         │
//!  ┌──────────────┐ tick  ┌───────────────┐     ┌────────────┐
//!  │OutboundQueue │──────▶│ BrokerSession │────▶│ BrokerLink │──▶ broker
//!  └──────────────┘       └───────────────┘     └────────────┘
//! ```

pub mod adapter;
pub mod backoff;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod link;
pub mod mqtt;
pub mod portal;
pub mod queue;
pub mod session;
pub mod tls;
pub mod topics;

// Public API
pub use adapter::{AdapterStats, DownlinkCallback, GatewayOutput, MqttOutput};
pub use backoff::Backoff;
pub use clock::{ClockSync, ManualClock, SntpClock, SystemClock};
pub use command::{ControlResponse, DataKind, DisconnectReason, DownlinkCommand};
pub use config::{BrokerConfig, GatewayConfig, QueueConfig, SessionConfig};
pub use error::{ConfigError, GatewayError, LinkError, QueueError, Result, RouteError};
pub use link::{BrokerLink, ConnectOptions, LastWill, LinkEvent, MemoryLink};
pub use mqtt::RumqttLink;
pub use portal::{ConfigPortal, MemoryPortal, PortalField};
pub use queue::{OutboundQueue, PublishRecord, Rejected};
pub use session::{BrokerSession, SessionState, SessionStats};
pub use tls::TlsConfig;
pub use topics::{Downlink, TopicRouter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
