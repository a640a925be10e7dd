// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Receipt event extraction
//!
//! Logs in a receipt are opaque: a list of 32-byte topics and a data blob.
//! An [`EventDescriptor`] pairs a canonical event signature with the kinds
//! of its indexed parameters and carries the precomputed `topic0`, the
//! keccak256 hash of the signature. [`extract_event`] scans the logs in
//! order and decodes the first one tagged with that topic.
//!
//! Several logs of a receipt may carry the same topic, for instance when the
//! contract is reached through an inner call. The first one in log order
//! always wins.
//!
//! Not finding the event is a regular [`Extraction::NotFound`] value: the
//! event may not have been emitted, the client may not have all logs yet, or
//! the signature may have drifted. The caller decides how much of that it
//! tolerates.

use std::collections::HashMap;

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use lazy_static::lazy_static;
use packet_contract::{
    PACKET_CLAIMED_SIGNATURE, PACKET_CREATED_SIGNATURE, PACKET_REFUNDED_SIGNATURE,
};

use crate::receipt::{LogEntry, TransactionReceipt};

const WORD: usize = 32;

/// ABI type of an indexed event parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexedKind {
    Uint,
    Address,
    Bool,
    Bytes32,
}

impl IndexedKind {
    fn decode(self, topic: &B256) -> IndexedValue {
        match self {
            IndexedKind::Uint => IndexedValue::Uint(U256::from_be_slice(topic.as_slice())),
            IndexedKind::Address => IndexedValue::Address(Address::from_word(*topic)),
            IndexedKind::Bool => IndexedValue::Bool(!topic.is_zero()),
            IndexedKind::Bytes32 => IndexedValue::Bytes32(*topic),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Bytes32(B256),
}

/// Describes how to recognize and decode one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    signature: String,
    indexed: Vec<IndexedKind>,
    topic: B256,
}

impl EventDescriptor {
    /// `signature` is the canonical form, e.g. `Transfer(address,address,uint256)`.
    pub fn new(signature: impl Into<String>, indexed: Vec<IndexedKind>) -> Self {
        let signature = signature.into();
        let topic = keccak256(signature.as_bytes());
        Self {
            signature,
            indexed,
            topic,
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Event name, the part of the signature before the parameter list
    pub fn name(&self) -> &str {
        self.signature
            .split_once('(')
            .map_or(self.signature.as_str(), |(name, _)| name)
    }

    pub fn topic(&self) -> B256 {
        self.topic
    }

    pub fn indexed_count(&self) -> usize {
        self.indexed.len()
    }

    /// A log matches when it is tagged with this topic and carries every
    /// indexed parameter.
    pub fn matches(&self, log: &LogEntry) -> bool {
        log.topics.first() == Some(&self.topic) && log.topics.len() > self.indexed.len()
    }

    fn decode(&self, log_index: usize, log: &LogEntry) -> ExtractedEvent {
        let indexed = self
            .indexed
            .iter()
            .zip(&log.topics[1..])
            .map(|(kind, topic)| kind.decode(topic))
            .collect();
        ExtractedEvent {
            log_index,
            address: log.address,
            indexed,
            data: log.data.clone(),
        }
    }
}

/// A decoded log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEvent {
    /// Position of the log within the receipt
    pub log_index: usize,
    /// Contract that emitted the log
    pub address: Address,
    /// Indexed parameters in declaration order
    pub indexed: Vec<IndexedValue>,
    /// Non-indexed parameters, ABI encoded
    pub data: Bytes,
}

impl ExtractedEvent {
    pub fn uint(&self, position: usize) -> Option<U256> {
        match self.indexed.get(position) {
            Some(IndexedValue::Uint(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn address(&self, position: usize) -> Option<Address> {
        match self.indexed.get(position) {
            Some(IndexedValue::Address(value)) => Some(*value),
            _ => None,
        }
    }

    /// Decodes the `position`-th 32-byte word of the data blob.
    ///
    /// Only meaningful for static parameter types.
    pub fn data_word(&self, position: usize) -> Option<U256> {
        let start = position.checked_mul(WORD)?;
        self.data
            .get(start..start.checked_add(WORD)?)
            .map(U256::from_be_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Found(ExtractedEvent),
    NotFound,
}

impl Extraction {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Found(_))
    }

    pub fn found(self) -> Option<ExtractedEvent> {
        match self {
            Extraction::Found(event) => Some(event),
            Extraction::NotFound => None,
        }
    }
}

/// Returns the first log of `receipt` matching `descriptor`.
pub fn extract_event(receipt: &TransactionReceipt, descriptor: &EventDescriptor) -> Extraction {
    receipt
        .logs
        .iter()
        .enumerate()
        .find(|(_, log)| descriptor.matches(log))
        .map_or(Extraction::NotFound, |(index, log)| {
            Extraction::Found(descriptor.decode(index, log))
        })
}

/// Event descriptors keyed by canonical signature
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    by_signature: HashMap<String, EventDescriptor>,
    by_topic: HashMap<B256, String>,
}

impl EventTable {
    pub fn insert(&mut self, descriptor: EventDescriptor) {
        self.by_topic
            .insert(descriptor.topic(), descriptor.signature().to_owned());
        self.by_signature
            .insert(descriptor.signature().to_owned(), descriptor);
    }

    pub fn get(&self, signature: &str) -> Option<&EventDescriptor> {
        self.by_signature.get(signature)
    }

    /// Finds the descriptor of the event a log was tagged with
    pub fn identify(&self, log: &LogEntry) -> Option<&EventDescriptor> {
        let signature = self.by_topic.get(log.topics.first()?)?;
        self.by_signature
            .get(signature)
            .filter(|descriptor| descriptor.matches(log))
    }

    /// Extracts the event registered under `signature`.
    ///
    /// An unknown signature is reported as [`Extraction::NotFound`].
    pub fn extract(&self, receipt: &TransactionReceipt, signature: &str) -> Extraction {
        self.get(signature)
            .map_or(Extraction::NotFound, |descriptor| {
                extract_event(receipt, descriptor)
            })
    }

    pub fn len(&self) -> usize {
        self.by_signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_signature.is_empty()
    }
}

impl FromIterator<EventDescriptor> for EventTable {
    fn from_iter<I: IntoIterator<Item = EventDescriptor>>(iter: I) -> Self {
        let mut table = EventTable::default();
        for descriptor in iter {
            table.insert(descriptor);
        }
        table
    }
}

lazy_static! {
    /// The events emitted by the RedPacket contract. All three index the
    /// packet id first and an account second.
    pub static ref RED_PACKET_EVENTS: EventTable = [
        PACKET_CREATED_SIGNATURE,
        PACKET_CLAIMED_SIGNATURE,
        PACKET_REFUNDED_SIGNATURE,
    ]
    .into_iter()
    .map(|signature| {
        EventDescriptor::new(signature, vec![IndexedKind::Uint, IndexedKind::Address])
    })
    .collect();
}

/// Extracts `PacketCreated(packetId, creator, totalAmount, totalPackets, isPasswordProtected, expiresAt)`
pub fn packet_created(receipt: &TransactionReceipt) -> Extraction {
    RED_PACKET_EVENTS.extract(receipt, PACKET_CREATED_SIGNATURE)
}

/// Extracts `PacketClaimed(packetId, claimer, amount)`
pub fn packet_claimed(receipt: &TransactionReceipt) -> Extraction {
    RED_PACKET_EVENTS.extract(receipt, PACKET_CLAIMED_SIGNATURE)
}

/// Extracts `PacketRefunded(packetId, creator, amount)`
pub fn packet_refunded(receipt: &TransactionReceipt) -> Extraction {
    RED_PACKET_EVENTS.extract(receipt, PACKET_REFUNDED_SIGNATURE)
}
