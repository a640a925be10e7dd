// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # RedPacket contract structs
//!
//! ABI bindings of the RedPacket contract together with the typed values
//! the client exchanges with it: packet identifiers, packet records and
//! the state-changing calls.
//!

mod abi;
mod call;
mod error;
mod packet;

pub use abi::{
    IRedPacket, PACKET_CLAIMED_SIGNATURE, PACKET_CREATED_SIGNATURE, PACKET_REFUNDED_SIGNATURE,
};
pub use call::PacketCall;
pub use error::ContractError;
pub use packet::{PacketId, PacketRecord};
