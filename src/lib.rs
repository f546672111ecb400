// EnigmaIOT - MQTT gateway wire helpers
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # EnigmaIOT wire helpers
//!
//! Byte-exact helpers shared by the EnigmaIOT gateway and its node firmware.
//! Everything here is pure computation: no I/O, no global state.
//!
//! ## Quick Start
//!
//! ```rust
//! use enigmaiot::{crc32, hex_dump, MacAddress};
//!
//! // CRC-32/MPEG-2, the variant the node firmware computes
//! assert_eq!(crc32(b"123456789"), 0x0376_E6E7);
//!
//! // Node identities are rendered as uppercase, colon-separated hex
//! let mac: MacAddress = "aa:bb:cc:11:22:33".parse().unwrap();
//! assert_eq!(mac.to_string(), "AA:BB:CC:11:22:33");
//!
//! assert_eq!(hex_dump(&[0x01, 0xAB]), "01 AB");
//! ```
//!
//! ## Modules
//!
//! - [`crc`]: CRC-32/MPEG-2 checksum, one-shot and incremental
//! - [`mac`]: 6-byte hardware addresses and their string form
//! - [`hex`]: bounded hex dumps for logging
//! - [`error`]: error types

pub mod crc;
pub mod error;
pub mod hex;
pub mod mac;

// Re-exports for convenient access
pub use crate::crc::{crc32, crc32_continue, Crc32};
pub use error::{CodecError, Result};
pub use hex::{hex_dump, write_hex_dump, HEX_DUMP_CAPACITY};
pub use mac::{mac_to_string, string_to_mac, MacAddress, MAC_STRING_LEN};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
