// EnigmaIOT - MQTT gateway wire helpers
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Hardware addresses
//!
//! Nodes are identified by their 6-byte ESP-NOW MAC. The canonical text form,
//! used as the key in every MQTT topic, is `XX:XX:XX:XX:XX:XX` in uppercase.
//!
//! Parsing is more lenient than formatting: hex digits are case-insensitive,
//! an octet may be one or two digits, and the final octet may be followed by
//! whitespace. Any other separator or trailing character is rejected.

use crate::error::{CodecError, Result};
use std::fmt;
use std::str::FromStr;

/// Length of the canonical string form (`AA:BB:CC:DD:EE:FF`)
pub const MAC_STRING_LEN: usize = 17;

/// A 6-byte hardware address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Broadcast address `FF:FF:FF:FF:FF:FF`
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);

    /// Wrap six raw bytes
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, which must be exactly six bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let octets: [u8; 6] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidMacLength(bytes.len()))?;
        Ok(Self(octets))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Consume into raw bytes
    pub fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            a, b, c, d, e, g
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

impl FromStr for MacAddress {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s).map(Self)
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl From<MacAddress> for [u8; 6] {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = CodecError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        Self::from_slice(bytes)
    }
}

/// Render a MAC held in a byte slice.
///
/// Returns `None` unless the slice holds exactly six bytes.
pub fn mac_to_string(mac: &[u8]) -> Option<String> {
    MacAddress::from_slice(mac).ok().map(|m| m.to_string())
}

/// Parse a MAC string into raw bytes.
///
/// Returns `None` on any syntax error; no partial result is produced.
pub fn string_to_mac(s: &str) -> Option<[u8; 6]> {
    parse(s).ok()
}

fn hex_value(c: Option<u8>) -> Option<u8> {
    match c? {
        c @ b'0'..=b'9' => Some(c - b'0'),
        c @ b'a'..=b'f' => Some(c - b'a' + 10),
        c @ b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn parse(s: &str) -> Result<[u8; 6]> {
    let bytes = s.as_bytes();
    let invalid = |offset: usize, reason: &'static str| {
        CodecError::InvalidMac { offset, reason }
    };

    let mut octets = [0u8; 6];
    let mut pos = 0;

    for (i, octet) in octets.iter_mut().enumerate() {
        let last = i == 5;
        let mut value = hex_value(bytes.get(pos).copied())
            .ok_or_else(|| invalid(pos, "expected hex digit"))?;
        pos += 1;

        let next = bytes.get(pos).copied();
        let octet_done = if last {
            next.map_or(true, |c| c.is_ascii_whitespace())
        } else {
            next == Some(b':')
        };

        if !octet_done {
            let low = hex_value(next).ok_or_else(|| invalid(pos, "expected hex digit"))?;
            pos += 1;
            value = (value << 4) | low;

            if !last && bytes.get(pos) != Some(&b':') {
                return Err(invalid(pos, "expected ':'"));
            }
        }

        *octet = value;
        if !last {
            pos += 1;
        }
    }

    if !bytes[pos..].iter().all(u8::is_ascii_whitespace) {
        return Err(invalid(pos, "trailing characters"));
    }

    Ok(octets)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: [u8; 6] = [0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33];

    #[test]
    fn test_display_uppercase() {
        let mac = MacAddress::new([0x0a, 0xbb, 0x0c, 0x01, 0x22, 0xf3]);
        assert_eq!(mac.to_string(), "0A:BB:0C:01:22:F3");
        assert_eq!(mac.to_string().len(), MAC_STRING_LEN);
    }

    #[test]
    fn test_parse_lowercase() {
        assert_eq!(string_to_mac("aa:bb:cc:11:22:33"), Some(NODE));
    }

    #[test]
    fn test_parse_dash_separator_fails() {
        assert_eq!(string_to_mac("aa-bb-cc-11-22-33"), None);
    }

    #[test]
    fn test_parse_single_digit_groups() {
        assert_eq!(
            string_to_mac("a:b:c:1:2:3"),
            Some([0x0A, 0x0B, 0x0C, 0x01, 0x02, 0x03])
        );
        assert_eq!(
            string_to_mac("AA:B:CC:1:22:3"),
            Some([0xAA, 0x0B, 0xCC, 0x01, 0x22, 0x03])
        );
    }

    #[test]
    fn test_parse_trailing_whitespace() {
        assert_eq!(string_to_mac("AA:BB:CC:11:22:33\n"), Some(NODE));
        assert_eq!(string_to_mac("AA:BB:CC:11:22:3 "), Some([0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x03]));
    }

    #[test]
    fn test_parse_rejections() {
        for bad in [
            "",
            "ZZ:BB:CC:11:22:33",
            "AA:BB:CC:11:22",
            "AA:BB:CC:11:22:",
            "AABBCC112233",
            "AA:BB:CC:11:22:33:44",
            "AA:BB:CC:11:22:33x",
            "AA:BB:CC:11:22:33 x",
            "AAA:BB:CC:11:22:33",
            ":AA:BB:CC:11:22:33",
            "AA::BB:CC:11:22:33",
        ] {
            assert!(bad.parse::<MacAddress>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_error_offset() {
        let err = "AA:BB-CC:11:22:33".parse::<MacAddress>().unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidMac {
                offset: 5,
                reason: "expected ':'"
            }
        );
    }

    #[test]
    fn test_mac_to_string_requires_six_bytes() {
        assert_eq!(mac_to_string(&NODE).as_deref(), Some("AA:BB:CC:11:22:33"));
        assert_eq!(mac_to_string(&NODE[..5]), None);
        assert_eq!(mac_to_string(&[]), None);
    }

    #[test]
    fn test_from_slice_length() {
        assert_eq!(
            MacAddress::from_slice(&[1, 2, 3]),
            Err(CodecError::InvalidMacLength(3))
        );
        assert_eq!(MacAddress::try_from(&NODE[..]).unwrap().octets(), NODE);
    }

    #[test]
    fn test_debug_format() {
        let mac = MacAddress::new(NODE);
        assert_eq!(format!("{:?}", mac), "MacAddress(AA:BB:CC:11:22:33)");
    }
}
