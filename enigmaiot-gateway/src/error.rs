// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the gateway output adapter
//!
//! Only [`GatewayError`] crosses the adapter boundary. Transport and routing
//! failures ([`LinkError`], [`RouteError`]) are absorbed by the session and
//! the router, and show up in logs, counters and session state instead.

use thiserror::Error;

/// Errors surfaced to the gateway core
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Broker configuration is missing or invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Outbound queue refused the record (back-pressure)
    #[error("Queue full: {0}")]
    QueueFull(#[from] QueueError),

    /// Output used before `begin()`
    #[error("Output not started")]
    NotStarted,

    /// Control message type with no MQTT mapping
    #[error("Unknown control message type: 0x{0:02x}")]
    UnknownControl(u8),

    /// Control message shorter than its type requires
    #[error("Control message 0x{kind:02x} too short: need {needed} bytes, got {actual}")]
    ControlTooShort { kind: u8, needed: usize, actual: usize },
}

/// Invalid or unreadable broker configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Broker host missing
    #[error("Broker address is empty")]
    EmptyHost,

    /// Field exceeds its length limit
    #[error("{field} too long: {len} characters (max {max})")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Port outside 1..=65535
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// Network name unusable as a topic root
    #[error("Invalid network name: {0:?}")]
    InvalidNetworkName(String),

    /// TLS enabled without a pinned root certificate
    #[error("TLS enabled but no CA certificate configured")]
    MissingCa,

    /// Config file could not be read or written
    #[error("Config file I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for the expected schema
    #[error("Config file format: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons the outbound queue rejects a record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Record count limit reached
    #[error("queue holds the maximum of {max_records} records")]
    Full { max_records: usize },

    /// Payload byte budget exhausted
    #[error("payload needs {needed} bytes, {available} available")]
    PayloadBudget { needed: usize, available: usize },

    /// Storage for the record could not be allocated
    #[error("allocation failed")]
    Alloc,
}

/// Transport-level failures reported by a broker link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Client request buffer is full; retry later
    #[error("transport busy")]
    Busy,

    /// Link used while closed
    #[error("link not open")]
    NotOpen,

    /// Broker refused the CONNECT
    #[error("connection refused: {0}")]
    Refused(String),

    /// Socket or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// TLS setup or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),
}

/// Inbound topics the router cannot map to a downlink command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    /// Topic is rooted at another network name
    #[error("topic {0:?} outside this network")]
    ForeignNetwork(String),

    /// Topic lacks the address or command segment
    #[error("topic {0:?} has no {1} segment")]
    MissingSegment(String, &'static str),

    /// Address segment is not a MAC
    #[error("invalid node address {0:?}")]
    InvalidAddress(String),

    /// Command path not in the downlink set
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
}

/// Result type alias for Gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
