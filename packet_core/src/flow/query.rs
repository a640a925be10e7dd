// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Read-only helpers shared by the controllers and the CLI

use alloy::primitives::Address;
use log::debug;
use packet_contract::{PacketId, PacketRecord};

use super::{ledger_error, resolve_contract};
use crate::{
    adapters::{Connection, ContractResolver, PacketReader},
    FlowError,
};

/// Fetches the record of `packet_id` from `contract`.
pub async fn read_packet<E>(
    context: &E,
    contract: Address,
    packet_id: PacketId,
) -> Result<PacketRecord, FlowError>
where
    E: PacketReader + Sync,
{
    debug!("Reading red packet {packet_id} from {contract}");
    context
        .packet_info(contract, packet_id)
        .await
        .map_err(|err| FlowError::Read(ledger_error(err).to_string()))
}

/// Reads `nextPacketId()` on the contract of the connected network.
///
/// Every packet id below the returned one has been assigned.
pub async fn next_packet_id<E, R>(context: &E, resolver: &R) -> Result<PacketId, FlowError>
where
    E: Connection + PacketReader + Sync,
    R: ContractResolver,
{
    let contract = resolve_contract(context, resolver).await?;
    context
        .next_packet_id(contract)
        .await
        .map_err(|err| FlowError::Read(ledger_error(err).to_string()))
}
