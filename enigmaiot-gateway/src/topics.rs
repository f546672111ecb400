// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Topic routing
//!
//! All traffic lives below the network name `N`:
//!
//! | Event              | Topic                         | Retain |
//! |--------------------|-------------------------------|--------|
//! | Node data          | `N/<mac>/data`                | no     |
//! | Lost messages      | `N/<mac>/debug/lostmessages`  | no     |
//! | Control response   | `N/<mac>/result/...`          | no     |
//! | Node joined        | `N/<mac>/hello`               | no     |
//! | Node disconnected  | `N/<mac>/status`              | yes    |
//! | Gateway status     | `N/gateway/status`            | yes    |
//!
//! Downlink commands arrive on `N/<mac>/get/...` and `N/<mac>/set/...`.

use crate::command::{ControlResponse, DataKind, DownlinkCommand};
use crate::error::RouteError;
use enigmaiot::MacAddress;

/// Node joined topic suffix
pub const NODE_HELLO: &str = "hello";
/// Node status topic suffix
pub const NODE_STATUS: &str = "status";
/// Gateway status topic suffix
pub const GATEWAY_STATUS: &str = "gateway/status";
/// Gateway status payload while connected
pub const GATEWAY_ONLINE: &[u8] = b"online";
/// Gateway status payload (last will and clean shutdown)
pub const GATEWAY_OFFLINE: &[u8] = b"offline";

/// A downlink command addressed to one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downlink {
    /// Target node
    pub address: MacAddress,
    /// Command
    pub command: DownlinkCommand,
    /// Raw payload, possibly truncated
    pub payload: Vec<u8>,
    /// Whether the payload was cut to the inbound ceiling
    pub truncated: bool,
}

/// Maps node events to topics and inbound topics to downlinks
#[derive(Debug, Clone)]
pub struct TopicRouter {
    network: String,
    max_inbound_payload: usize,
}

impl TopicRouter {
    /// Router for `network`, truncating inbound payloads above `max_inbound_payload`
    pub fn new(network: impl Into<String>, max_inbound_payload: usize) -> Self {
        Self {
            network: network.into(),
            max_inbound_payload,
        }
    }

    /// Network name
    pub fn network(&self) -> &str {
        &self.network
    }

    fn node_topic(&self, address: &MacAddress, suffix: &str) -> String {
        format!("{}/{}/{}", self.network, address, suffix)
    }

    /// Topic for uplink data
    pub fn data_topic(&self, address: &MacAddress, kind: DataKind) -> String {
        self.node_topic(address, kind.path())
    }

    /// Topic for a control response
    pub fn control_topic(&self, address: &MacAddress, response: &ControlResponse) -> String {
        self.node_topic(address, response.path())
    }

    /// Topic announcing a new node
    pub fn hello_topic(&self, address: &MacAddress) -> String {
        self.node_topic(address, NODE_HELLO)
    }

    /// Topic carrying a node's disconnect reason
    pub fn status_topic(&self, address: &MacAddress) -> String {
        self.node_topic(address, NODE_STATUS)
    }

    /// Retained gateway status topic (also the last-will topic)
    pub fn gateway_status_topic(&self) -> String {
        format!("{}/{}", self.network, GATEWAY_STATUS)
    }

    /// Downlink subscription filters, one per command
    pub fn subscriptions(&self) -> Vec<String> {
        DownlinkCommand::ALL
            .iter()
            .map(|command| format!("{}/+/{}", self.network, command.path()))
            .collect()
    }

    /// Split an inbound topic into node address and command
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the topic is not rooted at this network
    /// - the address or command segment is missing
    /// - the address is not a MAC
    /// - the command path is not in the downlink set
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Downlink, RouteError> {
        let rest = topic
            .strip_prefix(self.network.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| RouteError::ForeignNetwork(topic.to_string()))?;

        let (address, command) = rest
            .split_once('/')
            .ok_or_else(|| RouteError::MissingSegment(topic.to_string(), "command"))?;
        if address.is_empty() {
            return Err(RouteError::MissingSegment(topic.to_string(), "address"));
        }

        let address: MacAddress = address
            .parse()
            .map_err(|_| RouteError::InvalidAddress(address.to_string()))?;
        let command = DownlinkCommand::from_path(command)
            .ok_or_else(|| RouteError::UnknownCommand(command.to_string()))?;

        let truncated = payload.len() > self.max_inbound_payload;
        let kept = payload.len().min(self.max_inbound_payload);

        Ok(Downlink {
            address,
            command,
            payload: payload[..kept].to_vec(),
            truncated,
        })
    }
}
