// EnigmaIOT - MQTT gateway wire helpers
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Error types for the wire helpers

use thiserror::Error;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while converting between bytes and their text forms
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// MAC string could not be parsed
    #[error("Invalid MAC address at offset {offset}: {reason}")]
    InvalidMac { offset: usize, reason: &'static str },

    /// Byte slice is not exactly six bytes long
    #[error("Invalid MAC length: expected 6 bytes, got {0}")]
    InvalidMacLength(usize),
}
