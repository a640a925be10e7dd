// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::TxHash;
use async_trait::async_trait;

use crate::{
    receipt::{ReceiptHandle, TransactionRequest},
    LedgerError,
};

/// Submits state-changing calls and waits for their receipts.
///
/// # Example
///
/// For example code see [crate::context::memory::InMemoryLedger]
#[async_trait]
pub trait TransactionSender {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error
        + std::fmt::Debug
        + Into<LedgerError>
        + Send
        + Sync
        + 'static;

    /// Sends the call and returns as soon as the ledger accepted it.
    ///
    /// A call rejected before it gets a hash (user rejection, insufficient
    /// funds, a revert during gas estimation) is reported here.
    async fn send_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TxHash, Self::AdapterError>;

    /// Waits until the transaction leaves the pending state.
    ///
    /// There is no timeout: the future resolves only once the receipt is
    /// available or the ledger client fails. The returned handle may keep
    /// receiving logs after it is handed out.
    async fn await_receipt(&self, tx_hash: TxHash) -> Result<ReceiptHandle, Self::AdapterError>;
}
