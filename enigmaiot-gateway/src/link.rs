// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Broker link abstraction
//!
//! A [`BrokerLink`] is the transport underneath a broker session: it opens
//! an MQTT connection, reports what the broker sends back, and accepts
//! QoS 0 publishes and subscribes. The session owns all policy (timeouts,
//! backoff, resubscription); a link only moves packets.
//!
//! [`MemoryLink`] is an in-process broker stand-in for tests and local
//! runs. The production link is [`RumqttLink`](crate::mqtt::RumqttLink).

use crate::config::BrokerConfig;
use crate::error::LinkError;
use crate::queue::PublishRecord;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

/// Message the broker publishes if the gateway vanishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    /// Will topic
    pub topic: String,
    /// Will payload
    pub payload: Vec<u8>,
    /// Retain flag
    pub retain: bool,
}

/// Everything needed to open a broker connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// MQTT client identifier
    pub client_id: String,
    /// Broker address and credentials
    pub broker: BrokerConfig,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Last will
    pub last_will: LastWill,
    /// Pinned CA (PEM) for TLS; plain TCP when `None`
    pub ca_pem: Option<Vec<u8>>,
}

/// Something the broker sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// CONNECT acknowledged
    ConnAck,
    /// Inbound publish on a subscribed topic
    Message {
        /// Topic
        topic: String,
        /// Payload bytes
        payload: Vec<u8>,
    },
}

/// Transport underneath a broker session
pub trait BrokerLink {
    /// Start connecting. The CONNECT is acknowledged through [`poll`](Self::poll).
    fn open(&mut self, options: &ConnectOptions) -> Result<(), LinkError>;

    /// Wait at most `timeout` for the next broker event
    fn poll(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, LinkError>;

    /// Queue a QoS 0 publish. [`LinkError::Busy`] means retry later.
    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError>;

    /// Queue a QoS 0 subscribe
    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError>;

    /// Tear the connection down
    fn close(&mut self);

    /// Check if a connection is open or being opened
    fn is_open(&self) -> bool;
}

impl<L: BrokerLink + ?Sized> BrokerLink for Box<L> {
    fn open(&mut self, options: &ConnectOptions) -> Result<(), LinkError> {
        (**self).open(options)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<LinkEvent>, LinkError> {
        (**self).poll(timeout)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        (**self).publish(topic, payload, retain)
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError> {
        (**self).subscribe(filter)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

#[derive(Debug)]
struct MemoryBroker {
    open: bool,
    reachable: bool,
    busy: bool,
    fail_next_publish: Option<LinkError>,
    events: VecDeque<Result<LinkEvent, LinkError>>,
    published: Vec<PublishRecord>,
    subscriptions: Vec<String>,
    last_options: Option<ConnectOptions>,
    opens: usize,
    closes: usize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self {
            open: false,
            reachable: true,
            busy: false,
            fail_next_publish: None,
            events: VecDeque::new(),
            published: Vec::new(),
            subscriptions: Vec::new(),
            last_options: None,
            opens: 0,
            closes: 0,
        }
    }
}

/// In-process broker stand-in
///
/// Clones share one broker, so a test keeps a handle while the session
/// owns the link. A reachable broker acknowledges every open immediately.
#[derive(Debug, Clone, Default)]
pub struct MemoryLink {
    broker: Rc<RefCell<MemoryBroker>>,
}

impl MemoryLink {
    /// Create a reachable broker
    pub fn new() -> Self {
        Self::default()
    }

    /// Unreachable brokers never acknowledge CONNECT
    pub fn set_reachable(&self, reachable: bool) {
        self.broker.borrow_mut().reachable = reachable;
    }

    /// Make publishes report [`LinkError::Busy`]
    pub fn set_busy(&self, busy: bool) {
        self.broker.borrow_mut().busy = busy;
    }

    /// Fail the next publish with `error`
    pub fn fail_next_publish(&self, error: LinkError) {
        self.broker.borrow_mut().fail_next_publish = Some(error);
    }

    /// Deliver an inbound publish
    pub fn deliver(&self, topic: &str, payload: &[u8]) {
        self.broker
            .borrow_mut()
            .events
            .push_back(Ok(LinkEvent::Message {
                topic: topic.to_string(),
                payload: payload.to_vec(),
            }));
    }

    /// Report a transport failure on the next poll
    pub fn inject_error(&self, error: LinkError) {
        self.broker.borrow_mut().events.push_back(Err(error));
    }

    /// Everything published so far, oldest first
    pub fn published(&self) -> Vec<PublishRecord> {
        self.broker.borrow().published.clone()
    }

    /// Drain the publish log
    pub fn take_published(&self) -> Vec<PublishRecord> {
        std::mem::take(&mut self.broker.borrow_mut().published)
    }

    /// Filters subscribed on the current connection
    pub fn subscriptions(&self) -> Vec<String> {
        self.broker.borrow().subscriptions.clone()
    }

    /// Options of the most recent open
    pub fn last_options(&self) -> Option<ConnectOptions> {
        self.broker.borrow().last_options.clone()
    }

    /// Number of opens so far
    pub fn open_count(&self) -> usize {
        self.broker.borrow().opens
    }

    /// Number of closes so far
    pub fn close_count(&self) -> usize {
        self.broker.borrow().closes
    }
}

impl BrokerLink for MemoryLink {
    fn open(&mut self, options: &ConnectOptions) -> Result<(), LinkError> {
        let mut broker = self.broker.borrow_mut();
        broker.open = true;
        broker.opens += 1;
        broker.last_options = Some(options.clone());
        broker.subscriptions.clear();
        broker.events.clear();
        if broker.reachable {
            broker.events.push_back(Ok(LinkEvent::ConnAck));
        }
        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<Option<LinkEvent>, LinkError> {
        let mut broker = self.broker.borrow_mut();
        if !broker.open {
            return Err(LinkError::NotOpen);
        }
        match broker.events.pop_front() {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(error)) => {
                broker.open = false;
                Err(error)
            }
            None => Ok(None),
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), LinkError> {
        let mut broker = self.broker.borrow_mut();
        if !broker.open {
            return Err(LinkError::NotOpen);
        }
        if broker.busy {
            return Err(LinkError::Busy);
        }
        if let Some(error) = broker.fail_next_publish.take() {
            return Err(error);
        }
        broker
            .published
            .push(PublishRecord::new(topic, payload.to_vec(), retain));
        Ok(())
    }

    fn subscribe(&mut self, filter: &str) -> Result<(), LinkError> {
        let mut broker = self.broker.borrow_mut();
        if !broker.open {
            return Err(LinkError::NotOpen);
        }
        broker.subscriptions.push(filter.to_string());
        Ok(())
    }

    fn close(&mut self) {
        let mut broker = self.broker.borrow_mut();
        if broker.open {
            broker.closes += 1;
        }
        broker.open = false;
        broker.subscriptions.clear();
    }

    fn is_open(&self) -> bool {
        self.broker.borrow().open
    }
}
