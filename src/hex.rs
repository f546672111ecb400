// EnigmaIOT - MQTT gateway wire helpers
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Bounded hex dumps for log output

use std::fmt::Write;

/// Maximum number of characters a dump may occupy
pub const HEX_DUMP_CAPACITY: usize = 1000;

/// Render `bytes` as space-separated uppercase hex pairs.
///
/// Output stops silently once another pair would not fit in
/// [`HEX_DUMP_CAPACITY`] characters.
pub fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 3).min(HEX_DUMP_CAPACITY));
    write_hex_dump(&mut out, bytes);
    out
}

/// Append a dump of `bytes` to a caller-owned buffer.
///
/// The buffer is cleared first; the capacity bound applies to the whole dump.
pub fn write_hex_dump(out: &mut String, bytes: &[u8]) {
    out.clear();
    for byte in bytes {
        let needed = if out.is_empty() { 2 } else { 3 };
        if out.len() + needed > HEX_DUMP_CAPACITY {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        // Writing to a String cannot fail
        let _ = write!(out, "{:02X}", byte);
    }
}
