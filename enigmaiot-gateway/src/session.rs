// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Broker session state machine
//!
//! ```text
//!   Disconnected ──pump──▶ Connecting ──ConnAck──▶ Connected
//!                             │  ▲                     │
//!                 timeout or  │  │ backoff             │ transport
//!                 refusal     ▼  │ elapsed             │ error
//!                        ReconnectBackoff ◀────────────┘
//! ```
//!
//! Failed connects and lost connections share one backoff. It only resets
//! once a connection has stayed up for `stable_after`, so a broker that
//! accepts and then immediately drops the gateway is retried at a growing
//! interval.
//!
//! The session is driven by [`BrokerSession::pump`] from the gateway loop.
//! Nothing here blocks beyond one link poll: while connected that is the
//! configured poll slice, while connecting it is what is left of the
//! connect budget.
//!
//! With a [`ClockSync`] attached (TLS mode) the first CONNECT waits until
//! the clock reports a plausible time. The session stays `Connecting`
//! meanwhile.

use crate::backoff::Backoff;
use crate::clock::{is_plausible, ClockSync};
use crate::config::SessionConfig;
use crate::error::LinkError;
use crate::link::{BrokerLink, ConnectOptions, LinkEvent};
use crate::topics::{GATEWAY_OFFLINE, GATEWAY_ONLINE};
use log::{debug, info, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Externally visible session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection and none in progress
    Disconnected,
    /// Waiting for the clock or for CONNECT to be acknowledged
    Connecting,
    /// Broker acknowledged CONNECT
    Connected,
    /// Waiting out the delay after a failed connect or a lost connection
    ReconnectBackoff,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::ReconnectBackoff => "RECONNECT_BACKOFF",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    AwaitingClock,
    Handshake { deadline: Instant },
    Connected,
    Backoff { retry_at: Instant },
}

/// Session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Successful connects
    pub connects: u64,
    /// Connect attempts that timed out or were refused
    pub failed_connects: u64,
    /// Established connections lost to transport errors
    pub transport_failures: u64,
    /// Publishes accepted by the link
    pub publishes: u64,
    /// Inbound publishes handed to the dispatcher
    pub inbound: u64,
}

struct ClockGate {
    clock: Box<dyn ClockSync>,
    min_year: i32,
    ready: bool,
}

/// MQTT session with one broker
pub struct BrokerSession<L: BrokerLink> {
    link: L,
    config: SessionConfig,
    options: Option<ConnectOptions>,
    subscriptions: Vec<String>,
    phase: Phase,
    backoff: Backoff,
    clock: Option<ClockGate>,
    announce_pending: bool,
    connected_since: Option<Instant>,
    last_pump: Instant,
    stats: SessionStats,
}

impl<L: BrokerLink> BrokerSession<L> {
    /// Create an idle session over `link`
    pub fn new(link: L, config: SessionConfig) -> Self {
        Self {
            link,
            backoff: Backoff::from_config(&config),
            config,
            options: None,
            subscriptions: Vec::new(),
            phase: Phase::Idle,
            clock: None,
            announce_pending: false,
            connected_since: None,
            last_pump: Instant::now(),
            stats: SessionStats::default(),
        }
    }

    /// Hold connects until `clock` reports a year of at least `min_year`
    pub fn with_clock(mut self, clock: Box<dyn ClockSync>, min_year: i32) -> Self {
        self.set_clock(clock, min_year);
        self
    }

    /// See [`with_clock`](Self::with_clock)
    pub fn set_clock(&mut self, clock: Box<dyn ClockSync>, min_year: i32) {
        self.clock = Some(ClockGate {
            clock,
            min_year,
            ready: false,
        });
    }

    /// Start connecting. A started session ignores further calls.
    pub fn start(&mut self, options: ConnectOptions, subscriptions: Vec<String>, now: Instant) {
        if self.options.is_some() {
            debug!("Session already started ({})", self.state());
            return;
        }
        info!(
            "Starting MQTT session to {}:{} as {}",
            options.broker.host, options.broker.port, options.client_id
        );
        self.options = Some(options);
        self.subscriptions = subscriptions;
        self.last_pump = now;
        self.begin_connect(now);
    }

    /// Whether [`start`](Self::start) has been called
    pub fn is_started(&self) -> bool {
        self.options.is_some()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Idle => SessionState::Disconnected,
            Phase::AwaitingClock | Phase::Handshake { .. } => SessionState::Connecting,
            Phase::Connected => SessionState::Connected,
            Phase::Backoff { .. } => SessionState::ReconnectBackoff,
        }
    }

    /// Check if the broker session is up
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Connected
    }

    /// Connected with the `online` announcement out, so queued records may go
    pub fn ready_for_publish(&self) -> bool {
        self.phase == Phase::Connected && !self.announce_pending
    }

    /// Whether a TLS session is still waiting for the clock
    pub fn awaiting_clock(&self) -> bool {
        self.phase == Phase::AwaitingClock
    }

    /// Counters
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Underlying link
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Advance the state machine one step
    ///
    /// Inbound publishes are handed to `on_message` untouched, at most
    /// `inbound_budget` per call.
    pub fn pump(&mut self, now: Instant, on_message: &mut dyn FnMut(&str, &[u8])) -> SessionState {
        self.last_pump = now;
        match self.phase {
            Phase::Idle => {
                if self.options.is_some() {
                    self.begin_connect(now);
                }
            }
            Phase::AwaitingClock => self.begin_connect(now),
            Phase::Handshake { deadline } => self.poll_handshake(now, deadline, on_message),
            Phase::Connected => {
                self.settle(now);
                self.service(on_message);
            }
            Phase::Backoff { retry_at } => {
                if now >= retry_at {
                    self.begin_connect(now);
                }
            }
        }
        self.state()
    }

    /// Publish at QoS 0
    ///
    /// [`LinkError::Busy`] leaves the session up so the caller can retry;
    /// it is also returned while the `online` announcement is still pending.
    /// Any other failure drops the connection and starts the reconnect backoff.
    pub fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        if self.phase != Phase::Connected {
            return Err(LinkError::NotOpen);
        }
        if self.announce_pending {
            return Err(LinkError::Busy);
        }
        match self.link.publish(topic, payload, retain) {
            Ok(()) => {
                self.stats.publishes += 1;
                debug!("Published {} ({} bytes, retain={})", topic, payload.len(), retain);
                Ok(())
            }
            Err(LinkError::Busy) => Err(LinkError::Busy),
            Err(e) => {
                warn!("Publish to {} failed: {}", topic, e);
                self.drop_connection();
                Err(e)
            }
        }
    }

    /// Announce `offline` and close the connection
    pub fn shutdown(&mut self) {
        if self.phase == Phase::Connected {
            if let Some(will) = self.options.as_ref().map(|o| o.last_will.topic.clone()) {
                if let Err(e) = self.link.publish(&will, GATEWAY_OFFLINE, true) {
                    warn!("Could not announce offline status: {}", e);
                }
            }
        }
        self.link.close();
        self.phase = Phase::Idle;
        self.options = None;
        self.announce_pending = false;
        self.connected_since = None;
        info!("MQTT session closed");
    }

    fn begin_connect(&mut self, now: Instant) {
        if !self.clock_ready() {
            if self.phase != Phase::AwaitingClock {
                info!("Waiting for clock synchronization before connecting");
            }
            self.phase = Phase::AwaitingClock;
            return;
        }

        let Some(options) = self.options.as_ref() else {
            self.phase = Phase::Idle;
            return;
        };

        debug!(
            "Connecting to {}:{} (attempt {})",
            options.broker.host,
            options.broker.port,
            self.backoff.attempts() + 1
        );
        match self.link.open(options) {
            Ok(()) => {
                self.phase = Phase::Handshake {
                    deadline: now + self.config.connect_timeout,
                };
            }
            Err(e) => {
                warn!("Could not open broker link: {}", e);
                self.fail_connect(now);
            }
        }
    }

    fn clock_ready(&mut self) -> bool {
        let Some(gate) = self.clock.as_mut() else {
            return true;
        };
        if gate.ready {
            return true;
        }
        match gate.clock.poll() {
            Some(time) if is_plausible(time, gate.min_year) => {
                info!("Clock synchronized: {}", time);
                gate.ready = true;
                true
            }
            Some(time) => {
                debug!("Clock reads {}, not yet plausible", time);
                false
            }
            None => false,
        }
    }

    fn poll_handshake(
        &mut self,
        now: Instant,
        deadline: Instant,
        on_message: &mut dyn FnMut(&str, &[u8]),
    ) {
        let remaining = deadline.saturating_duration_since(now);
        if remaining.is_zero() {
            warn!(
                "Broker did not acknowledge CONNECT within {:?}",
                self.config.connect_timeout
            );
            self.fail_connect(now);
            return;
        }

        match self.link.poll(remaining) {
            Ok(Some(LinkEvent::ConnAck)) => self.on_connected(now),
            Ok(Some(LinkEvent::Message { topic, payload })) => {
                self.stats.inbound += 1;
                on_message(&topic, &payload);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.fail_connect(now);
            }
        }
    }

    fn on_connected(&mut self, now: Instant) {
        let subscribed = self.subscriptions.iter().try_for_each(|filter| {
            self.link
                .subscribe(filter)
                .map(|()| debug!("Subscribed to {}", filter))
                .map_err(|e| (filter.clone(), e))
        });
        if let Err((filter, e)) = subscribed {
            warn!("Subscribe to {} failed: {}", filter, e);
            self.fail_connect(now);
            return;
        }

        self.stats.connects += 1;
        self.connected_since = Some(now);
        self.phase = Phase::Connected;
        info!("MQTT session connected");

        self.announce_pending = true;
        self.announce();
    }

    fn announce(&mut self) {
        let Some(topic) = self.options.as_ref().map(|o| o.last_will.topic.clone()) else {
            return;
        };
        match self.link.publish(&topic, GATEWAY_ONLINE, true) {
            Ok(()) => {
                self.announce_pending = false;
                self.stats.publishes += 1;
                debug!("Announced online on {}", topic);
            }
            Err(LinkError::Busy) => debug!("Link busy, online announcement deferred"),
            Err(e) => {
                warn!("Online announcement failed: {}", e);
                self.drop_connection();
            }
        }
    }

    fn settle(&mut self, now: Instant) {
        let Some(since) = self.connected_since else {
            return;
        };
        if self.backoff.attempts() > 0
            && now.saturating_duration_since(since) >= self.config.stable_after
        {
            debug!("Connection stable, resetting reconnect backoff");
            self.backoff.reset();
        }
    }

    fn service(&mut self, on_message: &mut dyn FnMut(&str, &[u8])) {
        if self.announce_pending {
            self.announce();
            if self.phase != Phase::Connected {
                return;
            }
        }

        let mut timeout = self.config.poll_slice;
        for _ in 0..self.config.inbound_budget.max(1) {
            match self.link.poll(timeout) {
                Ok(Some(LinkEvent::Message { topic, payload })) => {
                    self.stats.inbound += 1;
                    on_message(&topic, &payload);
                }
                Ok(Some(LinkEvent::ConnAck)) => debug!("Ignoring duplicate CONNACK"),
                Ok(None) => break,
                Err(e) => {
                    warn!("Broker connection lost: {}", e);
                    self.drop_connection();
                    break;
                }
            }
            timeout = Duration::ZERO;
        }
    }

    fn fail_connect(&mut self, now: Instant) {
        self.link.close();
        self.stats.failed_connects += 1;
        let delay = self.backoff.next_delay();
        info!("Retrying broker connection in {:?}", delay);
        self.phase = Phase::Backoff {
            retry_at: now + delay,
        };
    }

    fn drop_connection(&mut self) {
        self.link.close();
        self.stats.transport_failures += 1;
        self.announce_pending = false;
        self.connected_since = None;
        let delay = self.backoff.next_delay();
        info!("Broker connection lost, reconnecting in {:?}", delay);
        self.phase = Phase::Backoff {
            retry_at: self.last_pump + delay,
        };
    }
}

impl<L: BrokerLink + fmt::Debug> fmt::Debug for BrokerSession<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession")
            .field("link", &self.link)
            .field("state", &self.state())
            .field("subscriptions", &self.subscriptions.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BrokerConfig;
    use crate::link::{LastWill, MemoryLink};
    use chrono::{TimeZone, Utc};

    fn options() -> ConnectOptions {
        ConnectOptions {
            client_id: "02:00:00:00:00:01".to_string(),
            broker: BrokerConfig::new("localhost", 1883),
            keep_alive: Duration::from_secs(15),
            last_will: LastWill {
                topic: "eiot/gateway/status".to_string(),
                payload: b"offline".to_vec(),
                retain: true,
            },
            ca_pem: None,
        }
    }

    fn subscriptions() -> Vec<String> {
        vec!["eiot/+/set/data".to_string(), "eiot/+/get/version".to_string()]
    }

    fn ignore(_: &str, _: &[u8]) {}

    fn started(handle: &MemoryLink, now: Instant) -> BrokerSession<MemoryLink> {
        let mut session = BrokerSession::new(handle.clone(), SessionConfig::default());
        session.start(options(), subscriptions(), now);
        session
    }

    #[test]
    fn test_idle_until_started() {
        let handle = MemoryLink::new();
        let mut session = BrokerSession::new(handle.clone(), SessionConfig::default());
        assert_eq!(session.pump(Instant::now(), &mut ignore), SessionState::Disconnected);
        assert_eq!(handle.open_count(), 0);
    }

    #[test]
    fn test_connect_subscribes_and_announces() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);
        assert_eq!(session.state(), SessionState::Connecting);

        assert_eq!(session.pump(now, &mut ignore), SessionState::Connected);
        assert_eq!(handle.subscriptions(), subscriptions());

        let published = handle.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic(), "eiot/gateway/status");
        assert_eq!(published[0].payload(), b"online");
        assert!(published[0].retain());
        assert_eq!(session.stats().connects, 1);
    }

    #[test]
    fn test_start_is_idempotent() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);
        session.start(options(), subscriptions(), now);
        assert_eq!(handle.open_count(), 1);
    }

    #[test]
    fn test_connect_timeout_backs_off() {
        let handle = MemoryLink::new();
        handle.set_reachable(false);
        let now = Instant::now();
        let mut session = started(&handle, now);

        assert_eq!(session.pump(now, &mut ignore), SessionState::Connecting);
        let later = now + Duration::from_secs(5);
        assert_eq!(session.pump(later, &mut ignore), SessionState::ReconnectBackoff);
        assert!(handle.last_options().is_some());
        assert_eq!(session.stats().failed_connects, 1);

        // Still inside the first 1 s backoff
        let early = later + Duration::from_millis(500);
        assert_eq!(session.pump(early, &mut ignore), SessionState::ReconnectBackoff);

        handle.set_reachable(true);
        let retry = later + Duration::from_secs(1);
        assert_eq!(session.pump(retry, &mut ignore), SessionState::Connecting);
        assert_eq!(session.pump(retry, &mut ignore), SessionState::Connected);
        assert_eq!(handle.open_count(), 2);
    }

    #[test]
    fn test_transport_error_backs_off_then_reconnects() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);
        session.pump(now, &mut ignore);

        handle.inject_error(LinkError::Transport("keepalive timeout".into()));
        assert_eq!(session.pump(now, &mut ignore), SessionState::ReconnectBackoff);
        assert_eq!(session.stats().transport_failures, 1);
        assert!(!handle.is_open());

        // Nothing happens inside the first 1 s delay
        let early = now + Duration::from_millis(999);
        for _ in 0..10 {
            assert_eq!(session.pump(early, &mut ignore), SessionState::ReconnectBackoff);
        }
        assert_eq!(handle.open_count(), 1);

        let retry = now + Duration::from_secs(1);
        assert_eq!(session.pump(retry, &mut ignore), SessionState::Connecting);
        assert_eq!(session.pump(retry, &mut ignore), SessionState::Connected);

        let online = handle
            .published()
            .iter()
            .filter(|r| r.payload() == b"online")
            .count();
        assert_eq!(online, 2);
        assert_eq!(handle.subscriptions().len(), 2);
    }

    #[test]
    fn test_inbound_forwarded_unmodified() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);
        session.pump(now, &mut ignore);

        handle.deliver("eiot/AA:BB:CC:11:22:33/set/data", &[0, 1, 2]);
        handle.deliver("anything/at/all", b"");

        let mut seen = Vec::new();
        session.pump(now, &mut |topic, payload| {
            seen.push((topic.to_string(), payload.to_vec()))
        });
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, "eiot/AA:BB:CC:11:22:33/set/data");
        assert_eq!(seen[0].1, vec![0, 1, 2]);
        assert_eq!(seen[1].0, "anything/at/all");
    }

    #[test]
    fn test_inbound_budget() {
        let handle = MemoryLink::new();
        let config = SessionConfig {
            inbound_budget: 2,
            ..Default::default()
        };
        let now = Instant::now();
        let mut session = BrokerSession::new(handle.clone(), config);
        session.start(options(), subscriptions(), now);
        session.pump(now, &mut ignore);

        for _ in 0..5 {
            handle.deliver("eiot/x", b"");
        }
        let mut count = 0;
        session.pump(now, &mut |_, _| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_publish_contract() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);
        assert_eq!(session.publish("t", b"x", false), Err(LinkError::NotOpen));

        session.pump(now, &mut ignore);
        handle.set_busy(true);
        assert_eq!(session.publish("t", b"x", false), Err(LinkError::Busy));
        assert!(session.is_connected());

        handle.set_busy(false);
        handle.fail_next_publish(LinkError::Transport("broken pipe".into()));
        assert!(session.publish("t", b"x", false).is_err());
        assert_eq!(session.state(), SessionState::ReconnectBackoff);
        assert_eq!(handle.close_count(), 1);
        assert_eq!(session.pump(now, &mut ignore), SessionState::ReconnectBackoff);
        assert_eq!(handle.open_count(), 1);
    }

    #[test]
    fn test_flapping_broker_backs_off_exponentially() {
        let handle = MemoryLink::new();
        let mut now = Instant::now();
        let mut session = started(&handle, now);
        session.pump(now, &mut ignore);

        // Accepted, then dropped straight away: 1 s, 2 s, 4 s
        for (round, delay) in [1u64, 2, 4].into_iter().enumerate() {
            handle.inject_error(LinkError::Transport("session taken over".into()));
            assert_eq!(session.pump(now, &mut ignore), SessionState::ReconnectBackoff);

            let early = now + Duration::from_millis(delay * 1000 - 1);
            assert_eq!(session.pump(early, &mut ignore), SessionState::ReconnectBackoff);
            assert_eq!(handle.open_count(), round + 1);

            now += Duration::from_secs(delay);
            assert_eq!(session.pump(now, &mut ignore), SessionState::Connecting);
            assert_eq!(session.pump(now, &mut ignore), SessionState::Connected);
        }
        assert_eq!(session.stats().transport_failures, 3);
        assert_eq!(session.stats().connects, 4);
    }

    #[test]
    fn test_stable_connection_resets_backoff() {
        let handle = MemoryLink::new();
        let mut now = Instant::now();
        let mut session = started(&handle, now);
        session.pump(now, &mut ignore);

        for _ in 0..2 {
            handle.inject_error(LinkError::Transport("reset".into()));
            session.pump(now, &mut ignore);
            now += Duration::from_secs(30);
            session.pump(now, &mut ignore);
            assert_eq!(session.pump(now, &mut ignore), SessionState::Connected);
        }

        // Up for 30 s: the next loss starts over at 1 s
        now += Duration::from_secs(30);
        session.pump(now, &mut ignore);
        handle.inject_error(LinkError::Transport("reset".into()));
        assert_eq!(session.pump(now, &mut ignore), SessionState::ReconnectBackoff);
        let retry = now + Duration::from_secs(1);
        assert_eq!(session.pump(retry, &mut ignore), SessionState::Connecting);
    }

    #[test]
    fn test_publish_held_until_announced() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);

        handle.set_busy(true);
        session.pump(now, &mut ignore);
        assert!(session.is_connected());
        assert!(!session.ready_for_publish());

        handle.set_busy(false);
        assert_eq!(session.publish("t", b"x", false), Err(LinkError::Busy));
        assert!(handle.published().is_empty());

        session.pump(now, &mut ignore);
        assert!(session.ready_for_publish());
        session.publish("t", b"x", false).unwrap();
        assert_eq!(payloads_of(&handle), vec![b"online".to_vec(), b"x".to_vec()]);
    }

    fn payloads_of(handle: &MemoryLink) -> Vec<Vec<u8>> {
        handle
            .published()
            .iter()
            .map(|r| r.payload().to_vec())
            .collect()
    }

    #[test]
    fn test_busy_announcement_retried_once() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);

        handle.set_busy(true);
        session.pump(now, &mut ignore);
        assert!(session.is_connected());
        assert!(handle.published().is_empty());

        handle.set_busy(false);
        session.pump(now, &mut ignore);
        session.pump(now, &mut ignore);
        assert_eq!(handle.published().len(), 1);
    }

    #[test]
    fn test_clock_gate_defers_connect() {
        let handle = MemoryLink::new();
        let clock = ManualClock::new();
        let now = Instant::now();
        let mut session = BrokerSession::new(handle.clone(), SessionConfig::default())
            .with_clock(Box::new(clock.clone()), 2019);
        session.start(options(), subscriptions(), now);

        assert_eq!(session.state(), SessionState::Connecting);
        assert!(session.awaiting_clock());
        assert_eq!(handle.open_count(), 0);

        clock.set(Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 10).unwrap());
        session.pump(now, &mut ignore);
        assert_eq!(handle.open_count(), 0);

        clock.set(Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        assert_eq!(session.pump(now, &mut ignore), SessionState::Connecting);
        assert_eq!(handle.open_count(), 1);
        assert_eq!(session.pump(now, &mut ignore), SessionState::Connected);
    }

    #[test]
    fn test_shutdown_announces_offline() {
        let handle = MemoryLink::new();
        let now = Instant::now();
        let mut session = started(&handle, now);
        session.pump(now, &mut ignore);

        session.shutdown();
        let last = handle.published().pop().unwrap();
        assert_eq!(last.payload(), b"offline");
        assert!(last.retain());
        assert!(!handle.is_open());
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_started());
    }
}
