// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Wall-clock synchronization for TLS sessions
//!
//! A TLS session does not send CONNECT until its [`ClockSync`] reports a
//! plausible time. Polling is non-blocking so the wait spreads over pump
//! ticks instead of stalling the gateway.

use chrono::{DateTime, Datelike, TimeDelta, Utc};
use log::{debug, info, warn};
use std::cell::Cell;
use std::io::ErrorKind;
use std::net::UdpSocket;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Seconds between the NTP era (1900) and the Unix epoch
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;
const SNTP_PACKET_LEN: usize = 48;
const SNTP_PORT: u16 = 123;
/// Wait before resending an unanswered request
const SNTP_RETRY: Duration = Duration::from_secs(2);

/// Source of wall-clock time
pub trait ClockSync {
    /// Advance synchronization one step.
    ///
    /// Returns the current time once it is known; `None` while still waiting.
    fn poll(&mut self) -> Option<DateTime<Utc>>;
}

/// Check a clock reading is recent enough to validate certificates
pub fn is_plausible(now: DateTime<Utc>, min_year: i32) -> bool {
    now.year() >= min_year
}

/// Trusts the host clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSync for SystemClock {
    fn poll(&mut self) -> Option<DateTime<Utc>> {
        Some(Utc::now())
    }
}

/// Externally driven clock
///
/// Clones share state, so one handle can be given to a session while
/// another sets the time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Option<DateTime<Utc>>>>,
}

impl ManualClock {
    /// An unsynchronized clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `now` from the next poll on
    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(Some(now));
    }

    /// Go back to unsynchronized
    pub fn clear(&self) {
        self.now.set(None);
    }
}

impl ClockSync for ManualClock {
    fn poll(&mut self) -> Option<DateTime<Utc>> {
        self.now.get()
    }
}

/// Minimal SNTPv4 client
///
/// Sends one request every two seconds from a non-blocking UDP socket and
/// keeps the offset between the server's transmit timestamp and the host
/// clock once a reply arrives.
#[derive(Debug)]
pub struct SntpClock {
    server: String,
    socket: Option<UdpSocket>,
    sent_at: Option<Instant>,
    offset: Option<TimeDelta>,
}

impl SntpClock {
    /// Query `server` on the standard NTP port
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            socket: None,
            sent_at: None,
            offset: None,
        }
    }

    fn send_request(&mut self) -> std::io::Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.set_nonblocking(true)?;
        socket.connect((self.server.as_str(), SNTP_PORT))?;

        let mut request = [0u8; SNTP_PACKET_LEN];
        // LI = 0, VN = 4, Mode = 3 (client)
        request[0] = 0x23;
        socket.send(&request)?;

        debug!("SNTP request sent to {}", self.server);
        self.socket = Some(socket);
        self.sent_at = Some(Instant::now());
        Ok(())
    }

    fn receive(&mut self) -> Option<DateTime<Utc>> {
        let socket = self.socket.as_ref()?;
        let mut buf = [0u8; SNTP_PACKET_LEN];
        match socket.recv(&mut buf) {
            Ok(len) if len >= SNTP_PACKET_LEN => match parse_sntp_reply(&buf) {
                Some(server_time) => Some(server_time),
                None => {
                    warn!("Discarding malformed SNTP reply from {}", self.server);
                    None
                }
            },
            Ok(len) => {
                warn!("Short SNTP reply ({} bytes) from {}", len, self.server);
                None
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("SNTP receive from {} failed: {}", self.server, e);
                self.socket = None;
                None
            }
        }
    }
}

impl ClockSync for SntpClock {
    fn poll(&mut self) -> Option<DateTime<Utc>> {
        if let Some(offset) = self.offset {
            return Some(Utc::now() + offset);
        }

        let due = self
            .sent_at
            .map_or(true, |sent| sent.elapsed() >= SNTP_RETRY);
        if due {
            if let Err(e) = self.send_request() {
                warn!("SNTP request to {} failed: {}", self.server, e);
                self.socket = None;
                self.sent_at = Some(Instant::now());
                return None;
            }
        }

        let server_time = self.receive()?;
        let offset = server_time - Utc::now();
        info!("Clock synchronized from {}: {}", self.server, server_time);
        self.offset = Some(offset);
        self.socket = None;
        Some(server_time)
    }
}

/// Extract the transmit timestamp from an SNTP server reply
pub fn parse_sntp_reply(packet: &[u8]) -> Option<DateTime<Utc>> {
    if packet.len() < SNTP_PACKET_LEN {
        return None;
    }
    let mode = packet[0] & 0x07;
    let stratum = packet[1];
    // Mode 4 is server; stratum 0 is a kiss-of-death reply
    if mode != 4 || stratum == 0 {
        return None;
    }

    let seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]);
    let fraction = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]);
    if seconds == 0 {
        return None;
    }

    let unix = i64::from(seconds) - NTP_UNIX_OFFSET;
    let nanos = ((u64::from(fraction) * 1_000_000_000) >> 32) as u32;
    DateTime::from_timestamp(unix, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reply(seconds: u32, fraction: u32) -> [u8; SNTP_PACKET_LEN] {
        let mut packet = [0u8; SNTP_PACKET_LEN];
        packet[0] = 0x24; // VN 4, mode 4
        packet[1] = 2;
        packet[40..44].copy_from_slice(&seconds.to_be_bytes());
        packet[44..48].copy_from_slice(&fraction.to_be_bytes());
        packet
    }

    #[test]
    fn test_parse_transmit_timestamp() {
        // 2020-01-01T00:00:00Z
        let unix = 1_577_836_800i64;
        let packet = reply((unix + NTP_UNIX_OFFSET) as u32, 0x8000_0000);

        let time = parse_sntp_reply(&packet).unwrap();
        assert_eq!(time.timestamp(), unix);
        assert_eq!(time.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_rejects_client_mode_and_kod() {
        let mut packet = reply(3_800_000_000, 0);
        packet[0] = 0x23;
        assert!(parse_sntp_reply(&packet).is_none());

        let mut packet = reply(3_800_000_000, 0);
        packet[1] = 0;
        assert!(parse_sntp_reply(&packet).is_none());

        assert!(parse_sntp_reply(&[0u8; 10]).is_none());
    }

    #[test]
    fn test_plausibility() {
        let old = Utc.with_ymd_and_hms(1970, 1, 1, 0, 5, 0).unwrap();
        let recent = Utc.with_ymd_and_hms(2019, 3, 1, 12, 0, 0).unwrap();
        assert!(!is_plausible(old, 2019));
        assert!(is_plausible(recent, 2019));
    }

    #[test]
    fn test_manual_clock_shared() {
        let handle = ManualClock::new();
        let mut clock = handle.clone();
        assert!(clock.poll().is_none());

        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        handle.set(now);
        assert_eq!(clock.poll(), Some(now));

        handle.clear();
        assert!(clock.poll().is_none());
    }

    #[test]
    fn test_system_clock_plausible() {
        let now = SystemClock.poll().unwrap();
        assert!(is_plausible(now, 2019));
    }
}
