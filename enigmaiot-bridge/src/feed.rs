// EnigmaIOT Bridge - MQTT output adapter runner
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Node event feed
//!
//! One JSON object per line stands in for the radio side of a gateway:
//!
//! ```text
//! {"event":"hello","mac":"AA:BB:CC:11:22:33","node_id":3}
//! {"event":"data","mac":"AA:BB:CC:11:22:33","payload":"21.5"}
//! {"event":"lost","mac":"AA:BB:CC:11:22:33","count":2}
//! {"event":"control","mac":"AA:BB:CC:11:22:33","bytes":[130,30,0,0,0]}
//! {"event":"disconnect","mac":"AA:BB:CC:11:22:33","reason":17}
//! ```

use enigmaiot::MacAddress;
use enigmaiot_gateway::{DataKind, DisconnectReason, Downlink, GatewayError, GatewayOutput};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Feed line errors
#[derive(Error, Debug)]
pub enum FeedError {
    /// Line is not a known event
    #[error("invalid event: {0}")]
    Json(#[from] serde_json::Error),

    /// `mac` field is not a MAC address
    #[error("invalid node address {0:?}")]
    Address(String),

    /// The adapter refused the event
    #[error(transparent)]
    Output(#[from] GatewayError),
}

/// Something a node did
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NodeEvent {
    /// Node registered
    Hello { mac: String, node_id: u16 },
    /// Uplink data
    Data { mac: String, payload: String },
    /// Lost message counter
    Lost { mac: String, count: u32 },
    /// Raw control response
    Control { mac: String, bytes: Vec<u8> },
    /// Node invalidated
    Disconnect { mac: String, reason: u8 },
}

impl NodeEvent {
    /// Parse one feed line
    pub fn parse(line: &str) -> Result<Self, FeedError> {
        Ok(serde_json::from_str(line)?)
    }

    fn mac(&self) -> &str {
        match self {
            Self::Hello { mac, .. }
            | Self::Data { mac, .. }
            | Self::Lost { mac, .. }
            | Self::Control { mac, .. }
            | Self::Disconnect { mac, .. } => mac,
        }
    }

    /// Hand the event to an output
    pub fn apply(&self, output: &mut dyn GatewayOutput) -> Result<(), FeedError> {
        let mac = self.mac();
        let address: MacAddress = mac.parse().map_err(|_| FeedError::Address(mac.to_string()))?;

        match self {
            Self::Hello { node_id, .. } => output.new_node_send(&address, *node_id)?,
            Self::Data { payload, .. } => {
                output.output_data_send(&address, payload.as_bytes(), DataKind::Data)?
            }
            Self::Lost { count, .. } => output.output_data_send(
                &address,
                count.to_string().as_bytes(),
                DataKind::LostMessages,
            )?,
            Self::Control { bytes, .. } => output.output_control_send(&address, bytes)?,
            Self::Disconnect { reason, .. } => {
                output.node_disconnected_send(&address, DisconnectReason::from(*reason))?
            }
        }
        Ok(())
    }
}

/// Render a downlink as one output line
pub fn downlink_line(downlink: &Downlink) -> String {
    json!({
        "mac": downlink.address.to_string(),
        "command": downlink.command.path(),
        "payload": String::from_utf8_lossy(&downlink.payload),
        "truncated": downlink.truncated,
    })
    .to_string()
}
