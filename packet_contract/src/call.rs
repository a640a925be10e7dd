// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::{
    primitives::{Bytes, U256},
    sol_types::SolCall,
};

use crate::{abi::IRedPacket, PacketId};

/// A state-changing call on the RedPacket contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketCall {
    /// `createPacket(totalPackets, password, durationInHours)`, payable
    Create {
        total_slots: u64,
        password: String,
        duration_hours: u64,
    },
    /// `claimPacket(packetId, password)`
    Claim { packet_id: PacketId, password: String },
    /// `refundPacket(packetId)`
    Refund { packet_id: PacketId },
}

impl PacketCall {
    pub fn function_name(&self) -> &'static str {
        match self {
            PacketCall::Create { .. } => "createPacket",
            PacketCall::Claim { .. } => "claimPacket",
            PacketCall::Refund { .. } => "refundPacket",
        }
    }

    /// Only `createPacket` accepts attached value.
    pub fn is_payable(&self) -> bool {
        matches!(self, PacketCall::Create { .. })
    }

    /// ABI-encoded calldata, selector included
    pub fn calldata(&self) -> Bytes {
        let encoded = match self {
            PacketCall::Create {
                total_slots,
                password,
                duration_hours,
            } => IRedPacket::createPacketCall {
                totalPackets: U256::from(*total_slots),
                password: password.clone(),
                durationInHours: U256::from(*duration_hours),
            }
            .abi_encode(),
            PacketCall::Claim {
                packet_id,
                password,
            } => IRedPacket::claimPacketCall {
                packetId: packet_id.as_u256(),
                password: password.clone(),
            }
            .abi_encode(),
            PacketCall::Refund { packet_id } => IRedPacket::refundPacketCall {
                packetId: packet_id.as_u256(),
            }
            .abi_encode(),
        };
        encoded.into()
    }
}
