// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Node-facing vocabulary: downlink commands, control responses, data kinds
//! and disconnect reasons.

use crate::error::GatewayError;
use serde_json::json;
use std::fmt;
use std::str::FromStr;

/// Commands the broker can send to a node, keyed by topic suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownlinkCommand {
    /// `get/version`
    GetVersion,
    /// `get/sleeptime`
    GetSleep,
    /// `set/sleeptime`
    SetSleep,
    /// `set/ota`
    SetOta,
    /// `set/identify`
    SetIdentify,
    /// `set/reset`
    SetResetConfig,
    /// `get/rssi`
    GetRssi,
    /// `set/data`
    SetUserData,
    /// `get/data`
    GetUserData,
}

impl DownlinkCommand {
    /// Every command, in subscription order
    pub const ALL: [DownlinkCommand; 9] = [
        DownlinkCommand::GetVersion,
        DownlinkCommand::GetSleep,
        DownlinkCommand::SetSleep,
        DownlinkCommand::SetOta,
        DownlinkCommand::SetIdentify,
        DownlinkCommand::SetResetConfig,
        DownlinkCommand::GetRssi,
        DownlinkCommand::SetUserData,
        DownlinkCommand::GetUserData,
    ];

    /// Topic suffix below `<network>/<mac>/`
    pub fn path(self) -> &'static str {
        match self {
            Self::GetVersion => "get/version",
            Self::GetSleep => "get/sleeptime",
            Self::SetSleep => "set/sleeptime",
            Self::SetOta => "set/ota",
            Self::SetIdentify => "set/identify",
            Self::SetResetConfig => "set/reset",
            Self::GetRssi => "get/rssi",
            Self::SetUserData => "set/data",
            Self::GetUserData => "get/data",
        }
    }

    /// Look a command up by topic suffix
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.path() == path)
    }
}

impl fmt::Display for DownlinkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for DownlinkCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path(s).ok_or_else(|| s.to_string())
    }
}

/// Uplink payload flavours carried by `output_data_send`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataKind {
    /// Sensor data, published on `<mac>/data`
    #[default]
    Data,
    /// Lost message counter, published on `<mac>/debug/lostmessages`
    LostMessages,
}

impl DataKind {
    /// Topic suffix
    pub fn path(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::LostMessages => "debug/lostmessages",
        }
    }
}

/// Why the gateway invalidated a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Unspecified failure
    Unknown,
    /// Malformed client hello
    WrongClientHello,
    /// Malformed key exchange
    WrongExchangeFinished,
    /// Data failed decryption or CRC
    WrongData,
    /// Node sent data before registering
    UnregisteredNode,
    /// Node not found in the node list
    NodeNotInList,
    /// Session key expired
    KeyExpired,
    /// Node removed on request
    Kicked,
    /// Code with no known meaning
    Other(u8),
}

impl DisconnectReason {
    /// Wire code
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0x00,
            Self::WrongClientHello => 0x01,
            Self::WrongExchangeFinished => 0x02,
            Self::WrongData => 0x03,
            Self::UnregisteredNode => 0x04,
            Self::NodeNotInList => 0x05,
            Self::KeyExpired => 0x11,
            Self::Kicked => 0x12,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for DisconnectReason {
    fn from(code: u8) -> Self {
        match code {
            0x00 => Self::Unknown,
            0x01 => Self::WrongClientHello,
            0x02 => Self::WrongExchangeFinished,
            0x03 => Self::WrongData,
            0x04 => Self::UnregisteredNode,
            0x05 => Self::NodeNotInList,
            0x11 => Self::KeyExpired,
            0x12 => Self::Kicked,
            other => Self::Other(other),
        }
    }
}

/// Control message type codes sent by nodes
pub mod control {
    /// Firmware version answer
    pub const VERSION_ANS: u8 = 0x81;
    /// Sleep time answer
    pub const SLEEP_ANS: u8 = 0x82;
    /// Config reset answer
    pub const RESET_ANS: u8 = 0x85;
    /// RSSI answer
    pub const RSSI_ANS: u8 = 0x86;
    /// User data answer
    pub const USERDATA_ANS: u8 = 0xA1;
    /// OTA progress answer
    pub const OTA_ANS: u8 = 0xFF;
}

/// A node's answer to a downlink command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlResponse {
    /// Firmware version
    Version { major: u8, minor: u8, patch: u8 },
    /// Sleep period in seconds
    SleepTime(u32),
    /// Config reset acknowledged
    Reset,
    /// Link quality towards the gateway
    Rssi { rssi: i8, channel: u8 },
    /// OTA result code
    Ota(u8),
    /// User-defined answer
    UserData(Vec<u8>),
}

impl ControlResponse {
    /// Decode a control message (type byte followed by its body)
    pub fn parse(bytes: &[u8]) -> Result<Self, GatewayError> {
        let (&kind, body) = bytes
            .split_first()
            .ok_or_else(|| GatewayError::ControlTooShort {
                kind: 0,
                needed: 1,
                actual: 0,
            })?;
        let need = |needed: usize| {
            if body.len() + 1 < needed {
                Err(GatewayError::ControlTooShort {
                    kind,
                    needed,
                    actual: bytes.len(),
                })
            } else {
                Ok(())
            }
        };

        match kind {
            control::VERSION_ANS => {
                need(4)?;
                Ok(Self::Version {
                    major: body[0],
                    minor: body[1],
                    patch: body[2],
                })
            }
            control::SLEEP_ANS => {
                need(5)?;
                Ok(Self::SleepTime(u32::from_le_bytes([
                    body[0], body[1], body[2], body[3],
                ])))
            }
            control::RESET_ANS => Ok(Self::Reset),
            control::RSSI_ANS => {
                need(3)?;
                Ok(Self::Rssi {
                    rssi: body[0] as i8,
                    channel: body[1],
                })
            }
            control::OTA_ANS => {
                need(2)?;
                Ok(Self::Ota(body[0]))
            }
            control::USERDATA_ANS => Ok(Self::UserData(body.to_vec())),
            other => Err(GatewayError::UnknownControl(other)),
        }
    }

    /// Topic suffix below `<network>/<mac>/`
    pub fn path(&self) -> &'static str {
        match self {
            Self::Version { .. } => "result/version",
            Self::SleepTime(_) => "result/sleeptime",
            Self::Reset => "result/reset",
            Self::Rssi { .. } => "result/rssi",
            Self::Ota(_) => "result/ota",
            Self::UserData(_) => "result/data",
        }
    }

    /// MQTT payload
    pub fn payload(&self) -> Vec<u8> {
        let value = match self {
            Self::Version {
                major,
                minor,
                patch,
            } => json!({ "version": format!("{}.{}.{}", major, minor, patch) }),
            Self::SleepTime(seconds) => json!({ "sleeptime": seconds }),
            Self::Reset => json!({ "reset": "OK" }),
            Self::Rssi { rssi, channel } => json!({ "rssi": rssi, "channel": channel }),
            Self::Ota(code) => json!({ "result": code }),
            Self::UserData(data) => return data.clone(),
        };
        value.to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_paths_roundtrip() {
        for command in DownlinkCommand::ALL {
            assert_eq!(DownlinkCommand::from_path(command.path()), Some(command));
        }
        assert_eq!(DownlinkCommand::from_path("set/unknown"), None);
        assert_eq!(
            "set/sleeptime".parse::<DownlinkCommand>(),
            Ok(DownlinkCommand::SetSleep)
        );
    }

    #[test]
    fn test_disconnect_reason_codes() {
        for code in 0..=255u8 {
            assert_eq!(DisconnectReason::from(code).code(), code);
        }
        assert_eq!(DisconnectReason::from(0x11), DisconnectReason::KeyExpired);
    }

    #[test]
    fn test_parse_version() {
        let response = ControlResponse::parse(&[control::VERSION_ANS, 0, 8, 2]).unwrap();
        assert_eq!(response.path(), "result/version");
        assert_eq!(response.payload(), br#"{"version":"0.8.2"}"#.to_vec());
    }

    #[test]
    fn test_parse_sleep_little_endian() {
        let response =
            ControlResponse::parse(&[control::SLEEP_ANS, 0x2C, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(response, ControlResponse::SleepTime(300));
        assert_eq!(response.payload(), br#"{"sleeptime":300}"#.to_vec());
    }

    #[test]
    fn test_parse_rssi() {
        let response = ControlResponse::parse(&[control::RSSI_ANS, 0xB5, 6]).unwrap();
        assert_eq!(response, ControlResponse::Rssi { rssi: -75, channel: 6 });
    }

    #[test]
    fn test_user_data_passthrough() {
        let response = ControlResponse::parse(&[control::USERDATA_ANS, 1, 2, 3]).unwrap();
        assert_eq!(response.payload(), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ControlResponse::parse(&[]),
            Err(GatewayError::ControlTooShort { .. })
        ));
        assert!(matches!(
            ControlResponse::parse(&[control::SLEEP_ANS, 1]),
            Err(GatewayError::ControlTooShort {
                kind: control::SLEEP_ANS,
                needed: 5,
                actual: 2
            })
        ));
        assert!(matches!(
            ControlResponse::parse(&[0x42]),
            Err(GatewayError::UnknownControl(0x42))
        ));
    }
}
