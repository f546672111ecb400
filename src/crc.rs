// EnigmaIOT - MQTT gateway wire helpers
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! CRC-32/MPEG-2 checksum
//!
//! Node firmware computes a non-reflected CRC over polynomial `0x04C11DB7`
//! with initial value `0xFFFFFFFF` and no final XOR. This is *not* the
//! Ethernet/zlib CRC-32; the two disagree on every non-trivial input.
//!
//! | Parameter | Value |
//! |-----------|-------|
//! | poly      | `0x04C11DB7` |
//! | init      | `0xFFFFFFFF` |
//! | refin     | false |
//! | refout    | false |
//! | xorout    | `0x00000000` |
//! | check     | `0x0376E6E7` |

use ::crc::{Crc, Digest, CRC_32_MPEG_2};

static MPEG2: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Compute the CRC-32/MPEG-2 of `data`.
///
/// An empty input yields the initial register value, `0xFFFFFFFF`.
pub fn crc32(data: &[u8]) -> u32 {
    MPEG2.checksum(data)
}

/// Continue a checksum over more bytes.
///
/// Since the variant has no output reflection and no final XOR, a finished
/// checksum is also a valid register state:
/// `crc32_continue(crc32(a), b) == crc32(a ++ b)`.
pub fn crc32_continue(crc: u32, data: &[u8]) -> u32 {
    let mut digest = MPEG2.digest_with_initial(crc);
    digest.update(data);
    digest.finalize()
}

/// Incremental CRC-32/MPEG-2 over a sequence of byte slices
#[derive(Clone)]
pub struct Crc32 {
    digest: Digest<'static, u32>,
}

impl Crc32 {
    /// Start a new checksum
    pub fn new() -> Self {
        Self {
            digest: MPEG2.digest(),
        }
    }

    /// Feed more bytes
    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Consume the hasher and return the checksum
    pub fn finalize(self) -> u32 {
        self.digest.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Crc32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc32").finish_non_exhaustive()
    }
}
