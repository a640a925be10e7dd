// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::Address;
use async_trait::async_trait;
use packet_contract::{PacketId, PacketRecord};

use crate::LedgerError;

/// Side-effect free read calls on the RedPacket contract.
///
/// Every call is idempotent, so a caller may drop the returned future at any
/// suspension point.
///
/// # Example
///
/// For example code see [crate::context::memory::InMemoryLedger]
#[async_trait]
pub trait PacketReader {
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

    /// `getPacketInfo(packetId)` on the contract at `contract`
    async fn packet_info(
        &self,
        contract: Address,
        packet_id: PacketId,
    ) -> Result<PacketRecord, Self::AdapterError>;

    /// `nextPacketId()`, the id the next created packet will receive
    async fn next_packet_id(&self, contract: Address) -> Result<PacketId, Self::AdapterError>;

    /// `hasClaimed(packetId, claimer)`
    async fn has_claimed(
        &self,
        contract: Address,
        packet_id: PacketId,
        claimer: Address,
    ) -> Result<bool, Self::AdapterError>;
}
