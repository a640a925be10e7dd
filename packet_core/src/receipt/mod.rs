// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Transaction receipts
//!
//! The ledger's confirmation record for a submitted call. Logs are kept in
//! the order the ledger reports them; their topics are opaque 32-byte words
//! until matched against an [`crate::event::EventDescriptor`].
//!
//! A ledger client hands out a [`ReceiptHandle`] rather than a plain
//! receipt: the client side may still be filling in the logs when the
//! receipt is first observed as mined, so a later read of the same handle
//! can see more logs without another network round trip.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use packet_contract::PacketCall;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Shared, possibly still populating, receipt
pub type ReceiptHandle = Arc<RwLock<TransactionReceipt>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Pending,
    Mined,
    /// Mined, but execution failed and no state changed
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Contract that emitted the log
    pub address: Address,
    /// `topics[0]` identifies the event, the rest are indexed parameters
    pub topics: Vec<B256>,
    pub data: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub status: ReceiptStatus,
    pub logs: Vec<LogEntry>,
}

impl TransactionReceipt {
    pub fn new(transaction_hash: TxHash, status: ReceiptStatus, logs: Vec<LogEntry>) -> Self {
        Self {
            transaction_hash,
            status,
            logs,
        }
    }

    pub fn into_handle(self) -> ReceiptHandle {
        Arc::new(RwLock::new(self))
    }
}

/// A contract call ready to be sent by a [`crate::adapters::TransactionSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    pub call: PacketCall,
    /// Attached native value in wei, zero for non-payable calls
    pub value: U256,
}
