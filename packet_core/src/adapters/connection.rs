// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::LedgerError;

/// Exposes the session the flows act on behalf of.
///
/// Establishing the session (wallet connection, key management) is up to
/// the implementor. Both methods return `None` while nothing is connected.
///
/// # Example
///
/// For example code see [crate::context::memory::InMemoryLedger]
#[async_trait]
pub trait Connection {
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

    /// Chain id of the network the session is connected to
    async fn chain_id(&self) -> Result<Option<u64>, Self::AdapterError>;

    /// Account that signs and pays for write calls
    async fn account(&self) -> Result<Option<Address>, Self::AdapterError>;
}
