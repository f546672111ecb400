// EnigmaIOT Gateway - MQTT output adapter
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Outbound publish queue
//!
//! Node events are never published synchronously: they are copied into an
//! owned [`PublishRecord`] and queued until the broker session is connected.
//! The queue is a strict FIFO. Records are not coalesced, reordered or
//! dropped on reconnect; a record leaves the queue only through [`pop`],
//! which the pump calls after the session accepted the publish.
//!
//! [`pop`]: OutboundQueue::pop

use crate::config::QueueConfig;
use crate::error::QueueError;
use std::collections::VecDeque;
use thiserror::Error;

/// One pending MQTT publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRecord {
    topic: String,
    payload: Vec<u8>,
    retain: bool,
}

impl PublishRecord {
    /// Build a record from owned parts
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>, retain: bool) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain,
        }
    }

    /// Copy borrowed parts into fresh storage, reporting allocation failure
    pub fn copy_from(topic: &str, payload: &[u8], retain: bool) -> Result<Self, QueueError> {
        let mut owned_topic = String::new();
        owned_topic
            .try_reserve_exact(topic.len())
            .map_err(|_| QueueError::Alloc)?;
        owned_topic.push_str(topic);

        let mut owned_payload = Vec::new();
        owned_payload
            .try_reserve_exact(payload.len())
            .map_err(|_| QueueError::Alloc)?;
        owned_payload.extend_from_slice(payload);

        Ok(Self {
            topic: owned_topic,
            payload: owned_payload,
            retain,
        })
    }

    /// Topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// MQTT retain flag
    pub fn retain(&self) -> bool {
        self.retain
    }

    /// Split into owned parts
    pub fn into_parts(self) -> (String, Vec<u8>, bool) {
        (self.topic, self.payload, self.retain)
    }
}

/// A record the queue refused, handed back to the producer
#[derive(Error, Debug)]
#[error("{error}")]
pub struct Rejected {
    /// Why the record was refused
    pub error: QueueError,
    /// The refused record
    pub record: PublishRecord,
}

/// Bounded FIFO of pending publishes
#[derive(Debug)]
pub struct OutboundQueue {
    records: VecDeque<PublishRecord>,
    config: QueueConfig,
    payload_bytes: usize,
}

impl OutboundQueue {
    /// Create an empty queue with the given limits
    pub fn new(config: QueueConfig) -> Self {
        Self {
            records: VecDeque::new(),
            config,
            payload_bytes: 0,
        }
    }

    /// Append a record at the tail
    ///
    /// # Errors
    ///
    /// Returns the record together with the reason when:
    /// - the record count limit is reached
    /// - the payload byte budget would be exceeded
    /// - queue storage cannot grow
    pub fn push(&mut self, record: PublishRecord) -> Result<(), Rejected> {
        if let Err(error) = self.admit(record.payload.len()) {
            return Err(Rejected { error, record });
        }
        if self.records.try_reserve(1).is_err() {
            return Err(Rejected {
                error: QueueError::Alloc,
                record,
            });
        }

        self.payload_bytes += record.payload.len();
        self.records.push_back(record);
        Ok(())
    }

    /// Copy `topic` and `payload` into a new record and append it
    pub fn enqueue(&mut self, topic: &str, payload: &[u8], retain: bool) -> Result<(), QueueError> {
        self.admit(payload.len())?;
        let record = PublishRecord::copy_from(topic, payload, retain)?;
        self.push(record).map_err(|rejected| rejected.error)
    }

    /// The oldest record, if any
    pub fn peek(&self) -> Option<&PublishRecord> {
        self.records.front()
    }

    /// Remove and return the oldest record. No-op on an empty queue.
    pub fn pop(&mut self) -> Option<PublishRecord> {
        let record = self.records.pop_front()?;
        self.payload_bytes -= record.payload.len();
        Some(record)
    }

    /// Number of pending records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total payload bytes pending
    pub fn payload_bytes(&self) -> usize {
        self.payload_bytes
    }

    /// Queue limits
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Discard every pending record, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.records.len();
        self.records.clear();
        self.payload_bytes = 0;
        dropped
    }

    /// Iterate pending records, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PublishRecord> {
        self.records.iter()
    }

    fn admit(&self, payload_len: usize) -> Result<(), QueueError> {
        if self.records.len() >= self.config.max_records {
            return Err(QueueError::Full {
                max_records: self.config.max_records,
            });
        }
        let available = self.config.max_payload_bytes.saturating_sub(self.payload_bytes);
        if payload_len > available {
            return Err(QueueError::PayloadBudget {
                needed: payload_len,
                available,
            });
        }
        Ok(())
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}
